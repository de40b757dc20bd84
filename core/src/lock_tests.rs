//! Spin lock tests: single-core acquire/release semantics of both lock
//! shapes.

use ternos_lib::testing::TestResult;
use ternos_lib::{SpinLock, SpinMutex, assert_eq_test, assert_test, define_test_suite};

/// Test: guard-based mutex serializes access and releases on drop.
pub fn test_spin_mutex_guard_cycle() -> TestResult {
    let mutex = SpinMutex::new(7u32);

    assert_test!(!mutex.is_locked(), "fresh mutex reports locked");
    {
        let mut guard = mutex.lock();
        assert_eq_test!(*guard, 7);
        *guard = 11;
        assert_test!(mutex.is_locked(), "held mutex reports unlocked");
        assert_test!(mutex.try_lock().is_none(), "second acquisition succeeded");
    }
    assert_test!(!mutex.is_locked(), "dropped guard left mutex locked");
    assert_eq_test!(*mutex.lock(), 11, "write lost across unlock");

    TestResult::Pass
}

/// Test: try_lock succeeds exactly when the mutex is free.
pub fn test_spin_mutex_try_lock() -> TestResult {
    let mutex = SpinMutex::new(0u32);

    let first = mutex.try_lock();
    assert_test!(first.is_some(), "try_lock on free mutex failed");
    assert_test!(mutex.try_lock().is_none(), "nested try_lock succeeded");
    drop(first);
    assert_test!(mutex.try_lock().is_some(), "try_lock after release failed");

    TestResult::Pass
}

/// Test: force_unlock recovers a mutex whose guard was leaked.
pub fn test_spin_mutex_force_unlock() -> TestResult {
    let mutex = SpinMutex::new(0u32);

    core::mem::forget(mutex.lock());
    assert_test!(mutex.is_locked(), "leaked guard released the mutex");

    unsafe {
        mutex.force_unlock();
    }
    assert_test!(!mutex.is_locked(), "force_unlock left mutex held");
    assert_eq_test!(*mutex.lock(), 0);

    TestResult::Pass
}

/// Test: the raw lock pairs explicit lock/unlock, including unlock from a
/// different call frame than the acquisition.
pub fn test_spin_lock_explicit_pairing() -> TestResult {
    let lock = SpinLock::new();

    assert_test!(!lock.is_locked());
    lock.lock();
    assert_test!(lock.is_locked(), "held raw lock reports unlocked");
    assert_test!(!lock.try_lock(), "try_lock on held raw lock succeeded");

    fn release_elsewhere(lock: &SpinLock) {
        lock.unlock();
    }
    release_elsewhere(&lock);

    assert_test!(!lock.is_locked(), "unlock did not release");
    assert_test!(lock.try_lock(), "try_lock after release failed");
    lock.unlock();

    TestResult::Pass
}

define_test_suite!(
    lock,
    [
        test_spin_mutex_guard_cycle,
        test_spin_mutex_try_lock,
        test_spin_mutex_force_unlock,
        test_spin_lock_explicit_pairing,
    ]
);
