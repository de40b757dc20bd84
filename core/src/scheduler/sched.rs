//! Scheduler core: ready queues, timeout list, selection, and the
//! yield/gain context-switch discipline.
//!
//! Everything here runs in the non-preemptive domain: the entry points
//! (`yield`, `wakeup`, `sleep_releasing`) turn preemption off before taking
//! the scheduler lock and restore it after their state transitions are
//! complete. The lock itself is released before the context swap.

use core::ptr;

use ternos_lib::klog_error;
use ternos_lib::{SpinLock, SpinMutex};

use ternos_abi::thread::{
    ContextPhase, FAIL_SAFE_PERIOD, LOWEST_PRIORITY, MAX_CONGESTION, NO_TIMEOUT, PRIORITY_LISTS,
    QUANTUM, SchedCause, ThreadKind, ThreadState, TOP_PRIORITY, TimerDuration,
};

use super::ccb;
use super::list::SchedList;
use super::tcb::{self, Tcb};
use crate::platform;

// ---------------------------------------------------------------------------
// Scheduler state
// ---------------------------------------------------------------------------

/// Everything the scheduler lock protects: the ready queues, the timeout
/// list, and the boost heuristics. TCB fields other than `owner_pcb`,
/// `kind`, `thread_func`, and `context` are covered by the same lock.
pub(crate) struct SchedState {
    /// One FIFO per priority; index equals priority.
    pub(crate) run_queues: [SchedList; PRIORITY_LISTS],
    /// Sleeping threads in non-decreasing `wakeup_time` order.
    pub(crate) timeouts: SchedList,
    /// Estimate of how many ready threads sit below the level we last
    /// scheduled from. Never negative.
    pub(crate) congestion: i32,
    /// Scheduling decisions since boot; forces a boost once per period.
    pub(crate) fail_safe: u32,
}

impl SchedState {
    const fn new() -> Self {
        Self {
            run_queues: [const { SchedList::new() }; PRIORITY_LISTS],
            timeouts: SchedList::new(),
            congestion: 0,
            fail_safe: 0,
        }
    }
}

static SCHED: SpinMutex<SchedState> = SpinMutex::new(SchedState::new());

/// Run `f` under the scheduler lock.
pub(crate) fn with_state<R>(f: impl FnOnce(&mut SchedState) -> R) -> R {
    let mut state = SCHED.lock();
    f(&mut *state)
}

/// Empty every queue and zero the heuristics. Callers own the fate of any
/// TCB that was still queued.
pub(crate) fn reset_state() {
    *SCHED.lock() = SchedState::new();
}

/// Current congestion estimate. Diagnostic.
pub fn congestion_level() -> i32 {
    SCHED.lock().congestion
}

/// Scheduling decisions since boot. Diagnostic.
pub fn fail_safe_ticks() -> u32 {
    SCHED.lock().fail_safe
}

// ---------------------------------------------------------------------------
// Queue operations (scheduler lock held)
// ---------------------------------------------------------------------------

/// Append `tcb` to the ready queue matching its priority, then nudge a
/// halted core so the new work gets picked up.
pub(crate) fn sched_queue_add(state: &mut SchedState, tcb: *mut Tcb) {
    unsafe {
        debug_assert!((*tcb).state == ThreadState::Ready);
        debug_assert!((*tcb).phase == ContextPhase::Clean);
        state.run_queues[(*tcb).priority as usize].push_back(tcb);
    }
    platform::core_restart_one();
}

/// Put `tcb` on the timeout list if it has a deadline.
///
/// The list stays sorted by absolute wakeup time; insertion goes after any
/// existing entry with the same deadline, so equal-time sleepers wake in
/// the order they slept.
pub(crate) fn sched_register_timeout(state: &mut SchedState, tcb: *mut Tcb, timeout: TimerDuration) {
    if timeout == NO_TIMEOUT {
        return;
    }
    unsafe {
        (*tcb).wakeup_time = platform::clock_now().saturating_add(timeout);

        let mut at = state.timeouts.head();
        while !at.is_null() && (*at).wakeup_time <= (*tcb).wakeup_time {
            at = (*at).sched_link.next;
        }
        state.timeouts.insert_before(at, tcb);
    }
}

/// Transition a stopped or freshly spawned thread to ready.
///
/// A thread whose context is still loaded somewhere (`Dirty`) is not queued
/// here; the gain phase of its successor sees the Ready state and queues it
/// once the hand-off finishes.
pub(crate) fn sched_make_ready(state: &mut SchedState, tcb: *mut Tcb) {
    unsafe {
        assert!(
            (*tcb).state == ThreadState::Stopped || (*tcb).state == ThreadState::Init,
            "make_ready on TCB {:p} in state {:?}",
            tcb,
            (*tcb).state
        );

        if (*tcb).wakeup_time != NO_TIMEOUT {
            debug_assert!((*tcb).sched_link.is_linked() && (*tcb).state == ThreadState::Stopped);
            state.timeouts.unlink(tcb);
            (*tcb).wakeup_time = NO_TIMEOUT;
        }

        (*tcb).state = ThreadState::Ready;

        if (*tcb).phase == ContextPhase::Clean {
            sched_queue_add(state, tcb);
        }
    }
}

/// Pick the next thread to run, or null when every queue is empty.
///
/// Wakes expired sleepers first, then scans the ready queues top-down and
/// pops the first head found. The congestion estimate moves with what the
/// scan saw, and a boost fires when it crosses `MAX_CONGESTION` or when the
/// fail-safe period elapses.
pub(crate) fn sched_queue_select(state: &mut SchedState) -> *mut Tcb {
    let now = platform::clock_now();
    loop {
        let head = state.timeouts.head();
        if head.is_null() || unsafe { (*head).wakeup_time } > now {
            break;
        }
        sched_make_ready(state, head);
    }

    let mut selected: *mut Tcb = ptr::null_mut();
    let mut found_at = LOWEST_PRIORITY - 1;
    let mut level = TOP_PRIORITY;
    while level >= LOWEST_PRIORITY {
        selected = unsafe { state.run_queues[level as usize].pop_front() };
        if !selected.is_null() {
            found_at = level;
            break;
        }
        level -= 1;
    }

    if found_at <= LOWEST_PRIORITY {
        // Nothing ready, or we are already scraping the bottom queue.
        state.congestion -= 1;
    } else {
        // Ready work below the level we just served means lower queues are
        // being passed over.
        let mut below = found_at - 1;
        loop {
            if !state.run_queues[below as usize].is_empty() {
                state.congestion += 1;
                break;
            }
            if below == LOWEST_PRIORITY {
                state.congestion -= 1;
                break;
            }
            below -= 1;
        }
    }
    if state.congestion < 0 {
        state.congestion = 0;
    }

    state.fail_safe = state.fail_safe.wrapping_add(1);

    // TODO: reset fail_safe inside boost_queues; with the equality check the
    // forced boost fires only the first time the counter reaches the period.
    if state.congestion >= MAX_CONGESTION || state.fail_safe == FAIL_SAFE_PERIOD {
        boost_queues(state);
    }

    selected
}

/// Float every non-top ready queue up one level, oldest levels first.
///
/// The top queue is left alone (there is nowhere higher to go), so threads
/// parked there keep their position until a quantum expiry demotes them.
pub(crate) fn boost_queues(state: &mut SchedState) {
    state.congestion = 0;

    let mut level = TOP_PRIORITY - 1;
    while level >= LOWEST_PRIORITY {
        loop {
            let tcb = unsafe { state.run_queues[level as usize].pop_front() };
            if tcb.is_null() {
                break;
            }
            unsafe {
                (*tcb).priority += 1;
                state.run_queues[(level + 1) as usize].push_back(tcb);
            }
        }
        level -= 1;
    }
}

/// Public boost entry point, exported for diagnostics.
pub fn boost() {
    let mut state = SCHED.lock();
    boost_queues(&mut state);
}

// ---------------------------------------------------------------------------
// Priority adjustment
// ---------------------------------------------------------------------------

/// Apply the per-cause priority effect to the outgoing thread.
///
/// Quantum expiry costs a level, I/O earns one back, and a mutex wait drops
/// the thread to the bottom until its first yield for any other cause,
/// which restores the pre-mutex priority.
pub(crate) fn adjust_priority(tcb: *mut Tcb, cause: SchedCause) {
    unsafe {
        match cause {
            SchedCause::Quantum => (*tcb).priority -= 1,
            SchedCause::Io => (*tcb).priority += 1,
            SchedCause::Mutex => {
                if !(*tcb).mutex_flag {
                    (*tcb).prev_queue = (*tcb).priority;
                }
                (*tcb).priority = LOWEST_PRIORITY;
                (*tcb).mutex_flag = true;
            }
            SchedCause::Pipe | SchedCause::Poll | SchedCause::Idle | SchedCause::User => {}
        }

        (*tcb).priority = (*tcb).priority.clamp(LOWEST_PRIORITY, TOP_PRIORITY);

        if (*tcb).mutex_flag && cause != SchedCause::Mutex {
            (*tcb).mutex_flag = false;
            (*tcb).priority = (*tcb).prev_queue;
        }
    }
}

// ---------------------------------------------------------------------------
// Sleep and wake
// ---------------------------------------------------------------------------

/// Make `tcb` runnable. Returns false, with no side effects, when the
/// thread is in any state other than stopped or freshly spawned.
pub fn wakeup(tcb: *mut Tcb) -> bool {
    let preempt = platform::preempt_off();

    let woke = {
        let mut state = SCHED.lock();
        let thread_state = unsafe { (*tcb).state };
        if thread_state == ThreadState::Stopped || thread_state == ThreadState::Init {
            sched_make_ready(&mut state, tcb);
            true
        } else {
            false
        }
    };

    if preempt {
        platform::preempt_on();
    }
    woke
}

/// Atomically suspend the current thread, releasing `mx` on the way down.
///
/// The mutex is unlocked while the scheduler lock is held and after the
/// state transition, so a waker that acquires `mx` always finds the sleeper
/// already suspended: no wakeup can fall between the unlock and the sleep.
pub fn sleep_releasing(
    state: ThreadState,
    mx: Option<&SpinLock>,
    cause: SchedCause,
    timeout: TimerDuration,
) {
    assert!(
        state.is_suspended(),
        "sleep_releasing with non-suspended state {:?}",
        state
    );

    let preempt = platform::preempt_off();
    let current = ccb::current_thread();

    {
        let mut sched = SCHED.lock();
        unsafe {
            (*current).state = state;
        }
        if state != ThreadState::Exited {
            sched_register_timeout(&mut sched, current, timeout);
        }
        if let Some(mx) = mx {
            mx.unlock();
        }
    }

    r#yield(cause);

    if preempt {
        platform::preempt_on();
    }
}

// ---------------------------------------------------------------------------
// Context switching
// ---------------------------------------------------------------------------

/// Scheduler entry point: give up the core for `cause`.
///
/// Adjusts the caller's priority, picks a successor, and swaps contexts.
/// Control returns here, possibly much later and possibly on another core,
/// and runs the gain phase for the new timeslice.
pub fn r#yield(cause: SchedCause) {
    // Quiet the alarm so the quantum handler cannot re-enter us.
    platform::cancel_alarm();
    let preempt = platform::preempt_off();

    let current = ccb::current_thread();
    let mut current_ready = false;

    let next = {
        let mut state = SCHED.lock();

        adjust_priority(current, cause);

        unsafe {
            match (*current).state {
                ThreadState::Running => {
                    (*current).state = ThreadState::Ready;
                    current_ready = true;
                }
                // Woken again before we finished going to sleep.
                ThreadState::Ready => current_ready = true,
                ThreadState::Stopped | ThreadState::Exited => {}
                ThreadState::Init => {
                    klog_error!("SCHED: thread {:p} entered yield in state Init", current);
                    panic!("bad thread state in yield");
                }
            }
        }

        let mut next = sched_queue_select(&mut state);
        if next.is_null() {
            next = if current_ready {
                current
            } else {
                unsafe { &raw mut (*ccb::current()).idle_thread }
            };
        }

        // Link the hand-off for the gain phase on the far side.
        unsafe {
            (*current).next = next;
            (*next).prev = current;
        }
        next
    };

    unsafe {
        let core = ccb::current();
        (*core).yields.fetch_add(1, core::sync::atomic::Ordering::Relaxed);

        if current != next {
            (*core).current_thread = next;
            (*core)
                .context_switches
                .fetch_add(1, core::sync::atomic::Ordering::Relaxed);
            platform::context_swap(&raw mut (*current).context, &raw mut (*next).context);
        }
    }

    // We are back on the core, a timeslice or an eon later.
    gain(preempt);
}

/// Alias for call sites that cannot use the raw identifier.
pub fn yield_(cause: SchedCause) {
    r#yield(cause)
}

/// First-half bookkeeping of every timeslice.
///
/// Marks the incoming thread running and finalizes the outgoing one:
/// requeue it if it stayed ready, reclaim it if it exited, leave it for its
/// waker if it stopped. Runs from `yield` after the swap and from
/// `thread_start` for first-time threads.
pub(crate) fn gain(preempt: bool) {
    let current = ccb::current_thread();
    let mut reap: *mut Tcb = ptr::null_mut();

    {
        let mut state = SCHED.lock();
        unsafe {
            let prev = (*current).prev;

            (*current).state = ThreadState::Running;
            (*current).phase = ContextPhase::Dirty;

            if current != prev {
                (*prev).phase = ContextPhase::Clean;
                match (*prev).state {
                    ThreadState::Ready => {
                        if (*prev).kind != ThreadKind::Idle {
                            sched_queue_add(&mut state, prev);
                        }
                    }
                    ThreadState::Exited => {
                        if !(*prev).owner_ptcb.is_null() {
                            (*(*prev).owner_ptcb).thread_exited = 1;
                        }
                        if !(*prev).owner_pcb.is_null() {
                            (*(*prev).owner_pcb).thread_count -= 1;
                        }
                        // Free outside the scheduler lock; the allocator
                        // takes its own.
                        reap = prev;
                    }
                    ThreadState::Stopped => {}
                    ThreadState::Init | ThreadState::Running => {
                        klog_error!(
                            "SCHED: predecessor {:p} in state {:?} during gain",
                            prev,
                            (*prev).state
                        );
                        panic!("bad predecessor state in gain");
                    }
                }
            }
        }
    }

    if !reap.is_null() {
        tcb::release_tcb(reap);
    }

    if preempt {
        platform::preempt_on();
    }

    // Higher priority, shorter slice: interactive threads get frequent
    // scheduling points while CPU hogs that sank down run in longer bursts.
    let priority = unsafe { (*current).priority };
    platform::set_alarm(QUANTUM / (priority as TimerDuration + 1));
}
