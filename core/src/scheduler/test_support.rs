//! Test scaffolding shared by the scheduler suites: a fully instrumented
//! platform service table with a controllable clock, plus the RAII fixture
//! that resets scheduler state around each test.
//!
//! The suites are structural: they exercise queues, state transitions, and
//! the boost machinery on core 0 without ever crossing stacks, so the mock
//! `context_swap` only counts invocations.

use core::alloc::Layout;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ternos_abi::thread::{CpuContext, InterruptSource, SYSTEM_PAGE_SIZE, TimerDuration};

use crate::platform::{self, PlatformServices};

static CLOCK_US: AtomicU64 = AtomicU64::new(0);
static LAST_ALARM_US: AtomicU64 = AtomicU64::new(0);
static ALARMS_SET: AtomicU64 = AtomicU64::new(0);
static ALARMS_CANCELLED: AtomicU64 = AtomicU64::new(0);
static HALTS: AtomicU64 = AtomicU64::new(0);
static RESTARTS_ONE: AtomicU64 = AtomicU64::new(0);
static RESTARTS_ALL: AtomicU64 = AtomicU64::new(0);
static CONTEXTS_BUILT: AtomicU64 = AtomicU64::new(0);
static CONTEXT_SWAPS: AtomicU64 = AtomicU64::new(0);
static PREEMPT_ENABLED: AtomicBool = AtomicBool::new(false);

fn clock_now() -> TimerDuration {
    CLOCK_US.load(Ordering::Relaxed)
}

fn set_alarm(delay: TimerDuration) {
    LAST_ALARM_US.store(delay, Ordering::Relaxed);
    ALARMS_SET.fetch_add(1, Ordering::Relaxed);
}

fn cancel_alarm() {
    ALARMS_CANCELLED.fetch_add(1, Ordering::Relaxed);
}

fn core_id() -> usize {
    0
}

fn core_count() -> usize {
    1
}

fn core_halt() {
    HALTS.fetch_add(1, Ordering::Relaxed);
}

fn core_restart_one() {
    RESTARTS_ONE.fetch_add(1, Ordering::Relaxed);
}

fn core_restart_all() {
    RESTARTS_ALL.fetch_add(1, Ordering::Relaxed);
}

fn set_interrupt_handler(_source: InterruptSource, _handler: Option<fn()>) {}

fn preempt_on() {
    PREEMPT_ENABLED.store(true, Ordering::Relaxed);
}

fn preempt_off() -> bool {
    PREEMPT_ENABLED.swap(false, Ordering::Relaxed)
}

unsafe fn context_init(_ctx: *mut CpuContext, _base: *mut u8, _len: usize, _entry: extern "C" fn()) {
    CONTEXTS_BUILT.fetch_add(1, Ordering::Relaxed);
}

unsafe fn context_swap(_old: *mut CpuContext, _new: *mut CpuContext) {
    CONTEXT_SWAPS.fetch_add(1, Ordering::Relaxed);
}

unsafe fn page_block_alloc(len: usize) -> *mut u8 {
    match Layout::from_size_align(len, SYSTEM_PAGE_SIZE) {
        Ok(layout) => alloc::alloc::alloc_zeroed(layout),
        Err(_) => ptr::null_mut(),
    }
}

unsafe fn page_block_free(block: *mut u8, len: usize) {
    match Layout::from_size_align(len, SYSTEM_PAGE_SIZE) {
        Ok(layout) => alloc::alloc::dealloc(block, layout),
        Err(_) => {}
    }
}

fn stack_annotate(_base: *mut u8, _len: usize) -> u64 {
    0
}

fn stack_discard(_token: u64) {}

static TEST_PLATFORM: PlatformServices = PlatformServices {
    clock_now,
    set_alarm,
    cancel_alarm,
    core_id,
    core_count,
    core_halt,
    core_restart_one,
    core_restart_all,
    set_interrupt_handler,
    preempt_on,
    preempt_off,
    context_init,
    context_swap,
    page_block_alloc,
    page_block_free,
    stack_annotate,
    stack_discard,
};

/// Register the instrumented table. First registration wins process-wide,
/// so the test image must call this before anything touches the platform.
pub fn install() {
    platform::register_platform(&TEST_PLATFORM);
}

pub fn set_clock(us: TimerDuration) {
    CLOCK_US.store(us, Ordering::Relaxed);
}

pub fn advance_clock(us: TimerDuration) {
    CLOCK_US.fetch_add(us, Ordering::Relaxed);
}

pub fn restarts_one() -> u64 {
    RESTARTS_ONE.load(Ordering::Relaxed)
}

pub fn restarts_all() -> u64 {
    RESTARTS_ALL.load(Ordering::Relaxed)
}

pub fn last_alarm_us() -> u64 {
    LAST_ALARM_US.load(Ordering::Relaxed)
}

pub fn context_swaps() -> u64 {
    CONTEXT_SWAPS.load(Ordering::Relaxed)
}

/// RAII fixture that sets up and tears down the scheduler test environment.
/// Setup happens on creation, teardown happens on Drop.
pub struct SchedFixture;

impl SchedFixture {
    pub fn new() -> Self {
        install();
        set_clock(0);
        crate::scheduler::runtime::initialize_scheduler();
        Self
    }
}

impl Default for SchedFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SchedFixture {
    fn drop(&mut self) {
        // Leave empty queues behind; any TCB a test spawned is the test's
        // to release before this runs.
        crate::scheduler::runtime::initialize_scheduler();
    }
}
