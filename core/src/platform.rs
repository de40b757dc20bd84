//! Platform hardware abstraction layer.
//!
//! The scheduler never talks to hardware directly. The host environment
//! (whatever boots this kernel, real or simulated) registers a table of
//! function pointers once during early boot, and everything in
//! `crate::scheduler` reaches timers, cores, and context switching through
//! the thin accessors below.
//!
//! Using an accessor before registration is a kernel bug and panics.

use spin::Once;

use ternos_abi::thread::{CpuContext, InterruptSource, TimerDuration};

/// The services the host environment must provide.
pub struct PlatformServices {
    // -- Clock and alarm --------------------------------------------------
    /// Monotonic clock, microseconds since boot.
    pub clock_now: fn() -> TimerDuration,
    /// Arm the calling core's one-shot timer; fires as an Alarm interrupt.
    pub set_alarm: fn(TimerDuration),
    pub cancel_alarm: fn(),

    // -- Cores ------------------------------------------------------------
    pub core_id: fn() -> usize,
    pub core_count: fn() -> usize,
    /// Halt the calling core until another core restarts it.
    pub core_halt: fn(),
    pub core_restart_one: fn(),
    pub core_restart_all: fn(),

    // -- Interrupts and preemption ----------------------------------------
    pub set_interrupt_handler: fn(InterruptSource, Option<fn()>),
    pub preempt_on: fn(),
    /// Disable local-core preemption; returns whether it was enabled.
    pub preempt_off: fn() -> bool,

    // -- Context switching -------------------------------------------------
    /// Build a context that begins executing `entry` on `[base, base+len)`.
    pub context_init: unsafe fn(ctx: *mut CpuContext, base: *mut u8, len: usize, entry: extern "C" fn()),
    /// Save the caller into `old`, resume `new`; returns when `old` is next
    /// reactivated.
    pub context_swap: unsafe fn(old: *mut CpuContext, new: *mut CpuContext),

    // -- Thread memory ----------------------------------------------------
    /// Page-granular block mapping for thread stacks (the host may add
    /// guard pages). Only exercised by the `mapped-thread-mem` variant.
    pub page_block_alloc: unsafe fn(len: usize) -> *mut u8,
    pub page_block_free: unsafe fn(ptr: *mut u8, len: usize),

    // -- Debug hooks ------------------------------------------------------
    /// Announce a stack range to the host's debugger/sanitizer, returning a
    /// token for `stack_discard`. Hosts without one register a no-op.
    pub stack_annotate: fn(base: *mut u8, len: usize) -> u64,
    pub stack_discard: fn(token: u64),
}

static PLATFORM: Once<&'static PlatformServices> = Once::new();

/// Register the platform service table. First registration wins; later
/// calls are ignored.
pub fn register_platform(services: &'static PlatformServices) {
    PLATFORM.call_once(|| services);
}

pub fn is_registered() -> bool {
    PLATFORM.get().is_some()
}

fn services() -> &'static PlatformServices {
    match PLATFORM.get() {
        Some(services) => services,
        None => panic!("platform services used before registration"),
    }
}

#[inline(always)]
pub fn clock_now() -> TimerDuration {
    (services().clock_now)()
}

#[inline(always)]
pub fn set_alarm(delay: TimerDuration) {
    (services().set_alarm)(delay)
}

#[inline(always)]
pub fn cancel_alarm() {
    (services().cancel_alarm)()
}

#[inline(always)]
pub fn core_id() -> usize {
    (services().core_id)()
}

#[inline(always)]
pub fn core_count() -> usize {
    (services().core_count)()
}

#[inline(always)]
pub fn core_halt() {
    (services().core_halt)()
}

#[inline(always)]
pub fn core_restart_one() {
    (services().core_restart_one)()
}

#[inline(always)]
pub fn core_restart_all() {
    (services().core_restart_all)()
}

#[inline(always)]
pub fn set_interrupt_handler(source: InterruptSource, handler: Option<fn()>) {
    (services().set_interrupt_handler)(source, handler)
}

#[inline(always)]
pub fn preempt_on() {
    (services().preempt_on)()
}

#[inline(always)]
pub fn preempt_off() -> bool {
    (services().preempt_off)()
}

#[inline(always)]
pub unsafe fn context_init(ctx: *mut CpuContext, base: *mut u8, len: usize, entry: extern "C" fn()) {
    (services().context_init)(ctx, base, len, entry)
}

#[inline(always)]
pub unsafe fn context_swap(old: *mut CpuContext, new: *mut CpuContext) {
    (services().context_swap)(old, new)
}

#[inline(always)]
pub unsafe fn page_block_alloc(len: usize) -> *mut u8 {
    (services().page_block_alloc)(len)
}

#[inline(always)]
pub unsafe fn page_block_free(ptr: *mut u8, len: usize) {
    (services().page_block_free)(ptr, len)
}

#[inline(always)]
pub fn stack_annotate(base: *mut u8, len: usize) -> u64 {
    (services().stack_annotate)(base, len)
}

#[inline(always)]
pub fn stack_discard(token: u64) {
    (services().stack_discard)(token)
}
