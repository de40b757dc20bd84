//! Per-core idle loop and scheduler bootstrap.

use core::ptr;

use ternos_lib::klog_info;

use ternos_abi::thread::{
    ContextPhase, InterruptSource, NO_TIMEOUT, SchedCause, ThreadKind, ThreadState, TOP_PRIORITY,
};

use super::ccb;
use super::list::SchedLink;
use super::sched::{self, r#yield};
use super::tcb::active_threads;
use crate::platform;
use crate::proc::get_pcb;

/// Alarm interrupt: the running thread's quantum is up.
fn alarm_handler() {
    r#yield(SchedCause::Quantum);
}

/// Inter-core interrupt. Delivery alone is enough to pull a halted core out
/// of `core_halt`; nothing more to do yet.
fn ici_handler() {}

/// Reset every ready queue and the timeout list. Called once, process-wide,
/// before any core enters `run_scheduler`.
pub fn initialize_scheduler() {
    sched::reset_state();
}

/// What each core runs when it has nothing better to do.
///
/// The idle thread offers the core to the scheduler, and otherwise halts
/// until new work (or its announcement) arrives. When the last active
/// thread is gone it wakes every core so all idle threads can leave their
/// loops, shutting the scheduler down machine-wide.
fn idle_loop() {
    r#yield(SchedCause::Idle);

    while active_threads() > 0 {
        platform::core_halt();
        r#yield(SchedCause::Idle);
    }

    platform::cancel_alarm();
    platform::core_restart_all();
}

/// Enter scheduling on the calling core. Returns only at machine shutdown,
/// once no active threads remain.
pub fn run_scheduler() {
    let core = ccb::current();

    unsafe {
        (*core).id = platform::core_id();

        let idle = &raw mut (*core).idle_thread;
        (*idle).owner_pcb = get_pcb(0);
        (*idle).owner_ptcb = ptr::null_mut();
        (*idle).kind = ThreadKind::Idle;
        (*idle).state = ThreadState::Running;
        (*idle).phase = ContextPhase::Dirty;
        (*idle).wakeup_time = NO_TIMEOUT;
        (*idle).priority = TOP_PRIORITY;
        (*idle).mutex_flag = false;
        (*idle).prev_queue = TOP_PRIORITY;
        (*idle).sched_link = SchedLink::detached();

        (*core).current_thread = idle;
    }

    platform::set_interrupt_handler(InterruptSource::Alarm, Some(alarm_handler));
    platform::set_interrupt_handler(InterruptSource::Ici, Some(ici_handler));

    klog_info!("SCHED: core {} scheduler online", unsafe { (*core).id });

    platform::preempt_on();
    idle_loop();

    // Scheduling is over on this core; we must be back on the idle thread.
    unsafe {
        assert!(
            ccb::current_thread() == &raw mut (*core).idle_thread,
            "core {} left the scheduler on a non-idle thread",
            (*core).id
        );
    }

    platform::set_interrupt_handler(InterruptSource::Alarm, None);
    platform::set_interrupt_handler(InterruptSource::Ici, None);

    klog_info!("SCHED: core {} scheduler offline", unsafe { (*core).id });
}
