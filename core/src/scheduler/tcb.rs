//! Thread control blocks and thread memory.
//!
//! Each thread lives in one page-aligned block: the TCB sits at the base,
//! rounded up to a whole page, and the stack occupies the remainder. The
//! scheduler never does pointer arithmetic on the block outside this module.
//!
//! ```text
//!   +--------------+  base
//!   |     TCB      |
//!   +--------------+  base + THREAD_TCB_SIZE
//!   |    stack     |
//!   +--------------+  base + THREAD_SIZE
//! ```
//!
//! A shared block means a thread overrunning its stack corrupts itself
//! before it can reach any other thread's memory.

#[cfg(not(feature = "mapped-thread-mem"))]
use core::alloc::Layout;
use core::ptr;

use ternos_lib::SpinMutex;
use ternos_lib::klog_error;

use ternos_abi::thread::{
    ContextPhase, CpuContext, NO_TIMEOUT, SYSTEM_PAGE_SIZE, THREAD_STACK_SIZE, ThreadKind,
    ThreadState, TOP_PRIORITY, TimerDuration,
};

use super::ccb;
use super::list::SchedLink;
use super::sched::gain;
use crate::platform;
use crate::proc::{Pcb, Ptcb};

/// TCB footprint, rounded up to a whole page.
pub const THREAD_TCB_SIZE: usize =
    (core::mem::size_of::<Tcb>() + SYSTEM_PAGE_SIZE - 1) & !(SYSTEM_PAGE_SIZE - 1);

/// Full allocation per thread: TCB pages plus the stack.
pub const THREAD_SIZE: usize = THREAD_TCB_SIZE + THREAD_STACK_SIZE;

/// Thread control block. One per live thread, embedded at the base of the
/// thread's memory block (idle TCBs are embedded in their CCB instead).
///
/// Field protection: `owner_pcb`, `kind`, `thread_func`, and `context` are
/// fixed after spawn (the context's bytes belong to the platform layer);
/// everything else is written under the scheduler lock.
pub struct Tcb {
    /// Owning process. Weak reference; the scheduler never frees through it.
    pub owner_pcb: *mut Pcb,
    /// User-visible thread handle, when one exists. Null for idle threads
    /// and for a process's initial thread.
    pub owner_ptcb: *mut Ptcb,
    pub kind: ThreadKind,
    pub state: ThreadState,
    pub phase: ContextPhase,
    /// Entry function for normal threads; idle threads run the idle loop
    /// and leave this empty.
    pub thread_func: Option<fn()>,
    pub context: CpuContext,
    /// Absolute wakeup deadline, or `NO_TIMEOUT`. Non-sentinel exactly
    /// while the TCB sits on the timeout list.
    pub wakeup_time: TimerDuration,
    pub priority: i32,
    /// Set while the priority is floored because of a mutex wait.
    pub mutex_flag: bool,
    /// Priority to restore when the mutex-caused descent ends.
    pub prev_queue: i32,
    pub sched_link: SchedLink,
    /// Hand-off linkage across a context switch: the outgoing thread points
    /// at its successor and vice versa, consumed by the gain phase.
    pub prev: *mut Tcb,
    pub next: *mut Tcb,
    /// Token from the platform's stack annotation hook.
    pub stack_watch: u64,
}

impl Tcb {
    /// Blank TCB for static embedding (idle threads). `run_scheduler` fills
    /// in the real fields before the first use.
    pub const fn idle_stub() -> Self {
        Self {
            owner_pcb: ptr::null_mut(),
            owner_ptcb: ptr::null_mut(),
            kind: ThreadKind::Idle,
            state: ThreadState::Init,
            phase: ContextPhase::Clean,
            thread_func: None,
            context: CpuContext::zeroed(),
            wakeup_time: NO_TIMEOUT,
            priority: TOP_PRIORITY,
            mutex_flag: false,
            prev_queue: TOP_PRIORITY,
            sched_link: SchedLink::detached(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
            stack_watch: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Active-thread accounting
// ---------------------------------------------------------------------------

// Counts existing threads, idle threads excepted. Never held together with
// the scheduler lock.
static ACTIVE_THREADS: SpinMutex<u32> = SpinMutex::new(0);

pub fn active_threads() -> u32 {
    *ACTIVE_THREADS.lock()
}

// ---------------------------------------------------------------------------
// Thread memory
// ---------------------------------------------------------------------------

#[cfg(not(feature = "mapped-thread-mem"))]
fn thread_layout() -> Layout {
    match Layout::from_size_align(THREAD_SIZE, SYSTEM_PAGE_SIZE) {
        Ok(layout) => layout,
        Err(_) => panic!("bad thread memory layout"),
    }
}

/// Heap-backed thread memory, page aligned.
#[cfg(not(feature = "mapped-thread-mem"))]
unsafe fn allocate_thread_block() -> *mut u8 {
    let block = alloc::alloc::alloc_zeroed(thread_layout());
    if block.is_null() {
        // A kernel that cannot allocate thread memory has no way forward.
        panic!("out of memory allocating a thread");
    }
    block
}

#[cfg(not(feature = "mapped-thread-mem"))]
unsafe fn free_thread_block(block: *mut u8) {
    alloc::alloc::dealloc(block, thread_layout());
}

/// Host-mapped thread memory. The host may surround the block with guard
/// pages so a stack overrun faults instead of scribbling.
#[cfg(feature = "mapped-thread-mem")]
unsafe fn allocate_thread_block() -> *mut u8 {
    let block = platform::page_block_alloc(THREAD_SIZE);
    if block.is_null() {
        panic!("out of memory allocating a thread");
    }
    block
}

#[cfg(feature = "mapped-thread-mem")]
unsafe fn free_thread_block(block: *mut u8) {
    platform::page_block_free(block, THREAD_SIZE);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// First frame of every normal thread.
///
/// Runs the first-timeslice bookkeeping (the spawner's context switch is
/// still pending finalization), then enters the thread function. Threads
/// leave through `thread_exit`, which suspends with `ThreadState::Exited`;
/// falling out of the entry function is unrecoverable.
pub(crate) extern "C" fn thread_start() {
    gain(true);

    let current = ccb::current_thread();
    let func = unsafe { (*current).thread_func };
    match func {
        Some(func) => func(),
        None => {
            klog_error!("SCHED: thread {:p} started with no entry function", current);
            panic!("thread without an entry function");
        }
    }

    klog_error!("SCHED: thread {:p} returned from its entry function", current);
    panic!("thread entry function returned");
}

/// Allocate and initialize a new thread belonging to `pcb`.
///
/// The thread starts in `Init` with top priority and a clean context; it
/// runs only after a `wakeup` makes it ready. The caller wires up
/// `owner_ptcb` if the thread has a user-visible handle.
pub fn spawn_thread(pcb: *mut Pcb, func: fn()) -> *mut Tcb {
    let block = unsafe { allocate_thread_block() };
    let tcb = block as *mut Tcb;

    unsafe {
        tcb.write(Tcb {
            owner_pcb: pcb,
            owner_ptcb: ptr::null_mut(),
            kind: ThreadKind::Normal,
            state: ThreadState::Init,
            phase: ContextPhase::Clean,
            thread_func: Some(func),
            context: CpuContext::zeroed(),
            wakeup_time: NO_TIMEOUT,
            priority: TOP_PRIORITY,
            mutex_flag: false,
            prev_queue: TOP_PRIORITY,
            sched_link: SchedLink::detached(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
            stack_watch: 0,
        });

        let stack_base = block.add(THREAD_TCB_SIZE);
        platform::context_init(
            &raw mut (*tcb).context,
            stack_base,
            THREAD_STACK_SIZE,
            thread_start,
        );
        (*tcb).stack_watch = platform::stack_annotate(stack_base, THREAD_STACK_SIZE);
    }

    *ACTIVE_THREADS.lock() += 1;

    tcb
}

/// Free a thread's memory block and drop it from the active count.
///
/// Only the gain phase of the successor may call this, after the context
/// switch off `tcb` has completed; at that point no core can still be
/// running on the block's stack.
pub fn release_tcb(tcb: *mut Tcb) {
    unsafe {
        platform::stack_discard((*tcb).stack_watch);
        free_thread_block(tcb as *mut u8);
    }

    let mut active = ACTIVE_THREADS.lock();
    debug_assert!(*active > 0, "active thread count underflow");
    *active -= 1;
}
