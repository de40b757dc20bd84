//! Intrusive TCB lists.
//!
//! Every TCB embeds one `SchedLink`, so a thread is a member of at most one
//! list at a time: a ready queue or the timeout list. The link records its
//! containing list, which makes membership checkable and double-insertion a
//! hard error instead of silent corruption.

use core::ptr;

use super::tcb::Tcb;

/// Embedded list linkage. `home` is null while detached.
pub struct SchedLink {
    pub(super) prev: *mut Tcb,
    pub(super) next: *mut Tcb,
    pub(super) home: *mut SchedList,
}

impl SchedLink {
    pub const fn detached() -> Self {
        Self {
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
            home: ptr::null_mut(),
        }
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        !self.home.is_null()
    }
}

/// Doubly-linked FIFO of TCBs through their embedded links.
pub struct SchedList {
    head: *mut Tcb,
    tail: *mut Tcb,
    len: usize,
}

// SAFETY: lists are only reached through the scheduler lock.
unsafe impl Send for SchedList {}

impl SchedList {
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            len: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn head(&self) -> *mut Tcb {
        self.head
    }

    /// Append `tcb` at the tail.
    ///
    /// # Safety
    /// `tcb` must point to a live TCB and the caller must hold the lock
    /// protecting this list.
    pub unsafe fn push_back(&mut self, tcb: *mut Tcb) {
        self.insert_before(ptr::null_mut(), tcb);
    }

    /// Remove and return the head, or null when empty.
    ///
    /// # Safety
    /// The caller must hold the lock protecting this list.
    pub unsafe fn pop_front(&mut self) -> *mut Tcb {
        let head = self.head;
        if !head.is_null() {
            self.unlink(head);
        }
        head
    }

    /// Splice `tcb` immediately before `at`; null `at` means the tail
    /// position.
    ///
    /// # Safety
    /// `tcb` must be detached; `at`, when non-null, must be a member of this
    /// list. The caller must hold the lock protecting this list.
    pub unsafe fn insert_before(&mut self, at: *mut Tcb, tcb: *mut Tcb) {
        let link = &raw mut (*tcb).sched_link;
        assert!(
            (*link).home.is_null(),
            "TCB {:p} inserted while already on a list",
            tcb
        );

        let prev = if at.is_null() {
            self.tail
        } else {
            debug_assert!((*at).sched_link.home == self as *mut SchedList);
            (*at).sched_link.prev
        };

        (*link).prev = prev;
        (*link).next = at;
        (*link).home = self;

        if prev.is_null() {
            self.head = tcb;
        } else {
            (*prev).sched_link.next = tcb;
        }
        if at.is_null() {
            self.tail = tcb;
        } else {
            (*at).sched_link.prev = tcb;
        }
        self.len += 1;
    }

    /// Detach `tcb` from this list, wherever it sits.
    ///
    /// # Safety
    /// `tcb` must be a member of this list. The caller must hold the lock
    /// protecting this list.
    pub unsafe fn unlink(&mut self, tcb: *mut Tcb) {
        let link = &raw mut (*tcb).sched_link;
        assert!(
            (*link).home == self as *mut SchedList,
            "TCB {:p} unlinked from a list it is not on",
            tcb
        );

        let prev = (*link).prev;
        let next = (*link).next;
        if prev.is_null() {
            self.head = next;
        } else {
            (*prev).sched_link.next = next;
        }
        if next.is_null() {
            self.tail = prev;
        } else {
            (*next).sched_link.prev = prev;
        }

        (*link).prev = ptr::null_mut();
        (*link).next = ptr::null_mut();
        (*link).home = ptr::null_mut();
        self.len -= 1;
    }

    /// Walk the list head-to-tail without detaching anything.
    ///
    /// # Safety
    /// The caller must hold the lock protecting this list for the duration
    /// of the walk.
    pub unsafe fn contains(&self, tcb: *mut Tcb) -> bool {
        let mut cursor = self.head;
        while !cursor.is_null() {
            if cursor == tcb {
                return true;
            }
            cursor = (*cursor).sched_link.next;
        }
        false
    }
}

impl Default for SchedList {
    fn default() -> Self {
        Self::new()
    }
}
