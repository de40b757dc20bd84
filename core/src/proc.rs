//! Minimal process-table interface.
//!
//! Process lifecycle lives outside this repository; the scheduler only needs
//! the two back-reference targets a TCB carries: the owning process (for
//! thread accounting) and the optional user-visible thread handle (for exit
//! notification). Both are written exclusively under the scheduler lock.

use core::cell::UnsafeCell;

use ternos_abi::thread::MAX_PROCESSES;

/// Process control block, reduced to the fields the scheduler touches.
#[derive(Clone, Copy)]
pub struct Pcb {
    /// Live threads belonging to this process. Decremented by the gain
    /// phase when one of them exits.
    pub thread_count: u32,
}

impl Pcb {
    pub const fn new() -> Self {
        Self { thread_count: 0 }
    }
}

impl Default for Pcb {
    fn default() -> Self {
        Self::new()
    }
}

/// User-visible thread handle. The exit path raises `thread_exited` so
/// joiners polling the handle observe the death.
pub struct Ptcb {
    pub thread_exited: u8,
}

impl Ptcb {
    pub const fn new() -> Self {
        Self { thread_exited: 0 }
    }
}

impl Default for Ptcb {
    fn default() -> Self {
        Self::new()
    }
}

struct PcbTable(UnsafeCell<[Pcb; MAX_PROCESSES]>);

// SAFETY: slots are handed out as raw pointers; all mutation of scheduler-
// visible fields happens under the scheduler lock.
unsafe impl Sync for PcbTable {}

static PROCESS_TABLE: PcbTable = PcbTable(UnsafeCell::new([Pcb::new(); MAX_PROCESSES]));

/// Slot 0 is the kernel process; idle threads are owned by it.
pub fn get_pcb(idx: usize) -> *mut Pcb {
    assert!(idx < MAX_PROCESSES, "process index {} out of range", idx);
    unsafe { (PROCESS_TABLE.0.get() as *mut Pcb).add(idx) }
}
