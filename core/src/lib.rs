#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod platform;
pub mod proc;
pub mod scheduler;

pub mod lock_tests;

pub use scheduler::ccb;
pub use scheduler::list_tests;
pub use scheduler::sched_tests;

pub use platform::{PlatformServices, register_platform};
pub use proc::{Pcb, Ptcb, get_pcb};
pub use scheduler::ccb::scheduler_stats;
pub use scheduler::runtime::{initialize_scheduler, run_scheduler};
pub use scheduler::sched::{
    boost, congestion_level, fail_safe_ticks, r#yield, sleep_releasing, wakeup, yield_,
};
pub use scheduler::tcb::{Tcb, active_threads, release_tcb, spawn_thread};
