#![no_std]

pub mod klog;
pub mod spinlock;
pub mod testing;

#[doc(hidden)]
pub use paste;

pub use klog::{
    KlogLevel, klog_get_level, klog_init, klog_is_enabled, klog_register_backend, klog_set_level,
};
pub use spinlock::{SpinLock, SpinMutex, SpinMutexGuard};
