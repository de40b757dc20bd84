//! Core control blocks.
//!
//! One `Ccb` per core: which thread the core is running, the core's idle
//! thread (embedded, never allocated), and switch counters. A core only
//! ever touches its own CCB, so the thread fields need no lock; the stats
//! are atomic so any core can aggregate them.

use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicU64, Ordering};

use ternos_abi::thread::MAX_CORES;

use super::tcb::Tcb;
use crate::platform;

pub struct Ccb {
    pub id: usize,
    pub current_thread: *mut Tcb,
    pub idle_thread: Tcb,
    pub context_switches: AtomicU64,
    pub yields: AtomicU64,
}

impl Ccb {
    const fn new() -> Self {
        Self {
            id: 0,
            current_thread: ptr::null_mut(),
            idle_thread: Tcb::idle_stub(),
            context_switches: AtomicU64::new(0),
            yields: AtomicU64::new(0),
        }
    }
}

struct CoreTable(UnsafeCell<[Ccb; MAX_CORES]>);

// SAFETY: each core dereferences only its own slot; cross-core reads go
// through the atomic counters.
unsafe impl Sync for CoreTable {}

static CORE_TABLE: CoreTable = CoreTable(UnsafeCell::new(
    [const { Ccb::new() }; MAX_CORES],
));

pub fn ccb_for(core: usize) -> *mut Ccb {
    assert!(core < MAX_CORES, "core index {} out of range", core);
    unsafe { (CORE_TABLE.0.get() as *mut Ccb).add(core) }
}

/// The calling core's CCB.
pub fn current() -> *mut Ccb {
    ccb_for(platform::core_id())
}

/// The thread the calling core is running.
pub fn current_thread() -> *mut Tcb {
    unsafe { (*current()).current_thread }
}

pub(crate) fn set_current_thread(tcb: *mut Tcb) {
    unsafe {
        (*current()).current_thread = tcb;
    }
}

/// Context switches and yields summed over every core.
pub fn scheduler_stats() -> (u64, u64) {
    let mut switches = 0;
    let mut yields = 0;
    for core in 0..MAX_CORES {
        let ccb = ccb_for(core);
        unsafe {
            switches += (*ccb).context_switches.load(Ordering::Relaxed);
            yields += (*ccb).yields.load(Ordering::Relaxed);
        }
    }
    (switches, yields)
}
