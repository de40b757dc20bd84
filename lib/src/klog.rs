//! Kernel logging.
//!
//! Everything in this tree logs through the `klog_*!` macros below. Two
//! gates sit between a macro call and actual output: the active level,
//! checked before any formatting happens, and the **sink**, a function
//! pointer the host registers once its console exists. This repository
//! owns no console of its own, so until a sink shows up every line is
//! dropped.
//!
//! # Sink contract
//!
//! The sink receives the formatted arguments for one complete line and
//! owes two things in return: the line reaches the output in one piece
//! even when several cores log concurrently, and the sink supplies the
//! line terminator itself. Format strings passed to the macros never end
//! in `\n`.
//!
//! # Registration
//!
//! ```ignore
//! // From the host's console driver, once it can accept writes:
//! ternos_lib::klog::klog_register_backend(console_sink);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Verbosity levels; lower value, more urgent.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl KlogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Error,
            1 => Self::Warn,
            2 => Self::Info,
            4 => Self::Trace,
            _ => Self::Debug,
        }
    }
}

const DEFAULT_LEVEL: KlogLevel = KlogLevel::Info;

/// Highest level that still gets through.
static THRESHOLD: AtomicU8 = AtomicU8::new(DEFAULT_LEVEL as u8);

#[inline(always)]
fn level_allows(level: KlogLevel) -> bool {
    level as u8 <= THRESHOLD.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// A registered sink: takes one formatted line, writes it atomically with
/// respect to other cores, and appends the terminator.
pub type KlogBackend = fn(fmt::Arguments<'_>);

/// The sink's address. Zero while nothing is registered.
static SINK: AtomicUsize = AtomicUsize::new(0);

/// Register the sink every later line goes through. Replaces any earlier
/// registration.
pub fn klog_register_backend(backend: KlogBackend) {
    SINK.store(backend as usize, Ordering::Release);
}

/// Put the level filter back to its boot default. Called once, very early.
pub fn klog_init() {
    THRESHOLD.store(DEFAULT_LEVEL as u8, Ordering::Relaxed);
}

pub fn klog_set_level(level: KlogLevel) {
    THRESHOLD.store(level as u8, Ordering::Relaxed);
}

pub fn klog_get_level() -> KlogLevel {
    KlogLevel::from_raw(THRESHOLD.load(Ordering::Relaxed))
}

pub fn klog_is_enabled(level: KlogLevel) -> bool {
    level_allows(level)
}

/// Filter a line by level, then hand it to the sink if one is registered.
///
/// This is the single funnel under all of the macros; call those instead
/// so the format arguments stay lazy.
pub fn log_args(level: KlogLevel, args: fmt::Arguments<'_>) {
    if !level_allows(level) {
        return;
    }
    let raw = SINK.load(Ordering::Acquire);
    if raw == 0 {
        return;
    }
    // SAFETY: SINK is written only by klog_register_backend, which stores a
    // genuine KlogBackend; fn pointers round-trip through usize on every
    // target this kernel runs on.
    let sink = unsafe { core::mem::transmute::<usize, KlogBackend>(raw) };
    sink(args);
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

/// Log at an explicit level. The per-level shorthands below all expand to
/// this.
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::klog::log_args($level, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_error {
    ($($arg:tt)*) => {
        $crate::klog!($crate::klog::KlogLevel::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! klog_warn {
    ($($arg:tt)*) => {
        $crate::klog!($crate::klog::KlogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! klog_info {
    ($($arg:tt)*) => {
        $crate::klog!($crate::klog::KlogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! klog_debug {
    ($($arg:tt)*) => {
        $crate::klog!($crate::klog::KlogLevel::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! klog_trace {
    ($($arg:tt)*) => {
        $crate::klog!($crate::klog::KlogLevel::Trace, $($arg)*)
    };
}
