//! Ticket-based spin locks.
//!
//! Both lock shapes in this module queue their waiters: every acquisition
//! draws a numbered ticket and the lock serves tickets strictly in order.
//! Under contention that gives FIFO handoff between cores, where a plain
//! test-and-set flag would let a fast core cut the line indefinitely.
//!
//! Neither shape masks interrupts or preemption on its own. The scheduler
//! enters its non-preemptive domain through the platform layer before it
//! locks anything, and code built on top of these locks carries whatever
//! discipline its context requires.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

/// Longest pause burst between two polls of the serving counter.
const MAX_BACKOFF: u32 = 64;

/// The ticket machinery shared by both lock shapes: a dispenser and a
/// now-serving counter. Both wrap freely; waiters compare for equality
/// only, so nothing breaks when the counters roll over.
struct Ticket {
    next: AtomicU32,
    serving: AtomicU32,
}

impl Ticket {
    const fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
            serving: AtomicU32::new(0),
        }
    }

    /// A drawn ticket that has not been served yet means the lock is busy.
    fn held(&self) -> bool {
        self.next.load(Ordering::Relaxed) != self.serving.load(Ordering::Relaxed)
    }

    /// Draw a ticket and spin until it comes up.
    ///
    /// The poll of `serving` is Acquire: once our number appears, every
    /// write the previous holder made inside the critical section is
    /// visible. Between polls the waiter sits in a pause burst that doubles
    /// up to `MAX_BACKOFF`, so long queues do not hammer the lock's cache
    /// line.
    fn acquire(&self) {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        let mut pause = 1;
        while self.serving.load(Ordering::Acquire) != ticket {
            for _ in 0..pause {
                spin_loop();
            }
            if pause < MAX_BACKOFF {
                pause <<= 1;
            }
        }
    }

    /// Draw a ticket only if it would be served on the spot. A compare-
    /// exchange on the dispenser keeps this race-free: if any other core
    /// drew a ticket in the meantime, the exchange fails and no ticket is
    /// taken.
    fn try_acquire(&self) -> bool {
        let serving = self.serving.load(Ordering::Relaxed);
        self.next
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Call up the next ticket. Release ordering publishes the holder's
    /// writes to whoever is served next.
    fn release(&self) {
        self.serving.fetch_add(1, Ordering::Release);
    }

    /// Cancel every outstanding ticket, leaving the lock free.
    fn release_all(&self) {
        self.serving
            .store(self.next.load(Ordering::Relaxed), Ordering::Release);
    }
}

// =============================================================================
// SpinMutex - guard-based data lock
// =============================================================================

/// Spin mutex that owns the data it protects; access goes through an RAII
/// guard. This is the lock in front of the scheduler state and the
/// active-thread counter.
pub struct SpinMutex<T> {
    ticket: Ticket,
    data: UnsafeCell<T>,
}

// SAFETY: the ticket queue admits one holder at a time, so handing &T/&mut T
// out through the guard never aliases.
unsafe impl<T: Send> Send for SpinMutex<T> {}
unsafe impl<T: Send> Sync for SpinMutex<T> {}

pub struct SpinMutexGuard<'a, T> {
    mutex: &'a SpinMutex<T>,
}

impl<T> SpinMutex<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            ticket: Ticket::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Whether the mutex is currently held or has queued waiters.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.ticket.held()
    }

    #[inline]
    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        self.ticket.acquire();
        SpinMutexGuard { mutex: self }
    }

    /// Acquire without queueing. Returns `None` if the mutex is held or
    /// anyone is already waiting on it.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinMutexGuard<'_, T>> {
        if self.ticket.try_acquire() {
            Some(SpinMutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Release the mutex with no guard in hand, unblocking all queued
    /// waiters in order.
    ///
    /// # Safety
    /// The holding guard must have been leaked, and nothing may still be
    /// executing inside the critical section. The one legitimate caller is
    /// scheduler re-initialization between test suites; the protected data
    /// counts as unknown until rebuilt.
    #[inline]
    pub unsafe fn force_unlock(&self) {
        self.ticket.release_all();
    }
}

impl<'a, T> Deref for SpinMutexGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for SpinMutexGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for SpinMutexGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.mutex.ticket.release();
    }
}

// =============================================================================
// SpinLock - raw lock with explicit lock/unlock
// =============================================================================

/// Bare ticket lock with explicit `lock()` / `unlock()` and no data inside.
///
/// Kernel mutexes are built from this shape, and it is what
/// `sleep_releasing` accepts: a sleeping thread acquires in one call frame
/// and the scheduler releases on its behalf under the scheduler lock. A
/// guard cannot travel that path; an explicit unlock can.
pub struct SpinLock {
    ticket: Ticket,
}

impl SpinLock {
    #[inline]
    pub const fn new() -> Self {
        Self {
            ticket: Ticket::new(),
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.ticket.held()
    }

    #[inline]
    pub fn lock(&self) {
        self.ticket.acquire();
    }

    /// Acquire without queueing; false if someone holds or waits on the
    /// lock.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.ticket.try_acquire()
    }

    /// Hand the lock to the next waiter in line.
    ///
    /// Pairing is the caller's contract: exactly one `unlock` per
    /// successful `lock`/`try_lock`, not necessarily from the frame that
    /// acquired.
    #[inline]
    pub fn unlock(&self) {
        self.ticket.release();
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}
