//! Thread ABI types shared between the scheduler and the host environment.
//!
//! This module contains **only** the types, constants, and enums that form the
//! stable interface between the scheduler core and the platform layer that
//! hosts it. Kernel-internal implementation details (the TCB itself, queue
//! linkage, core control blocks) live in `ternos_core::scheduler`.

// --- Scheduler configuration ---

/// Number of ready queues; index equals priority.
pub const PRIORITY_LISTS: usize = 8;
pub const TOP_PRIORITY: i32 = PRIORITY_LISTS as i32 - 1;
pub const LOWEST_PRIORITY: i32 = 0;

pub const MAX_CORES: usize = 16;
pub const MAX_PROCESSES: usize = 32;

/// Thread memory blocks are allocated in multiples of this.
pub const SYSTEM_PAGE_SIZE: usize = 4096;
pub const THREAD_STACK_SIZE: usize = 0x10000; // 64 KiB

/// Full timeslice in microseconds. A thread at priority `p` is re-armed for
/// `QUANTUM / (p + 1)`, so high-priority threads get shorter slices.
pub const QUANTUM: TimerDuration = 10_000;

/// Congestion level at which the scheduler floats lower queues up a level.
pub const MAX_CONGESTION: i32 = 30;

/// Scheduling decisions between forced boosts, congestion notwithstanding.
pub const FAIL_SAFE_PERIOD: u32 = 500;

// --- Timer types ---

/// Microsecond count, both as a duration and as an absolute clock reading.
pub type TimerDuration = u64;

/// Sentinel for "no deadline".
pub const NO_TIMEOUT: TimerDuration = TimerDuration::MAX;

// --- ThreadState ---

/// Type-safe thread state with explicit state-machine semantics.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThreadState {
    /// Spawned but never made ready.
    #[default]
    Init = 0,
    /// Waiting in a ready queue.
    Ready = 1,
    /// Executing on some core.
    Running = 2,
    /// Suspended; woken by `wakeup` or by timeout expiry.
    Stopped = 3,
    /// Finished; the TCB is reclaimed by the successor's gain phase.
    Exited = 4,
}

impl ThreadState {
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Init,
            1 => Self::Ready,
            2 => Self::Running,
            3 => Self::Stopped,
            4 => Self::Exited,
            _ => Self::Init,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for the states `sleep_releasing` accepts.
    #[inline]
    pub const fn is_suspended(self) -> bool {
        matches!(self, Self::Stopped | Self::Exited)
    }

    #[inline]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Init => matches!(target, Self::Ready),
            Self::Ready => matches!(target, Self::Running),
            Self::Running => matches!(target, Self::Ready | Self::Stopped | Self::Exited),
            Self::Stopped => matches!(target, Self::Ready),
            Self::Exited => false,
        }
    }
}

// --- ThreadKind ---

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThreadKind {
    #[default]
    Normal = 0,
    /// One per core, embedded in the core control block. Never queued,
    /// never counted in `active_threads`.
    Idle = 1,
}

// --- ContextPhase ---

/// Whether a thread's hardware context is currently loaded on some core.
/// A `Dirty` thread must not be requeued; the gain phase of its successor
/// finishes the hand-off and marks it `Clean`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ContextPhase {
    #[default]
    Clean = 0,
    Dirty = 1,
}

// --- SchedCause ---

/// Why a thread entered the scheduler. Drives the priority adjustment in
/// `yield`; the match there is exhaustive, so adding a variant is a compile
/// error until its effect is decided.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedCause {
    /// Timeslice expired.
    Quantum = 0,
    /// Blocked on (or woken from) I/O.
    Io = 1,
    /// Blocked on a contended kernel mutex.
    Mutex = 2,
    Pipe = 3,
    Poll = 4,
    /// The core's idle thread giving way.
    Idle = 5,
    /// Explicit user-requested reschedule or sleep.
    User = 6,
}

// --- InterruptSource ---

/// Interrupt lines the scheduler installs handlers for.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptSource {
    /// Per-core one-shot timer; quantum expiry.
    Alarm = 0,
    /// Inter-core interrupt.
    Ici = 1,
}

// --- CpuContext ---

/// Saved CPU execution state, opaque to the scheduler.
///
/// The platform's `context_init`/`context_swap` services interpret this blob;
/// the scheduler only stores it inside the TCB and passes pointers through.
/// Sized and aligned generously so any register file the host needs fits.
#[repr(C, align(16))]
pub struct CpuContext {
    raw: [u64; 32],
}

impl CpuContext {
    pub const fn zeroed() -> Self {
        Self { raw: [0; 32] }
    }

    /// The backing words, for the platform layer that interprets them.
    pub fn as_words_mut(&mut self) -> &mut [u64; 32] {
        &mut self.raw
    }
}
