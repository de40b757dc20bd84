#![no_std]

pub mod thread;

pub use thread::{
    ContextPhase, CpuContext, InterruptSource, SchedCause, ThreadKind, ThreadState, TimerDuration,
};
