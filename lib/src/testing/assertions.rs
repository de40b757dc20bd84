//! Assertion macros for in-kernel tests.
//!
//! Each one logs what went wrong and bails out of the enclosing test with
//! a failure, via [`test_bail!`], instead of panicking; one broken
//! invariant should fail its test, not take the whole test image down.

#[macro_export]
macro_rules! assert_test {
    ($cond:expr) => {
        if !$cond {
            $crate::test_bail!("assertion failed: {}", stringify!($cond));
        }
    };
    ($cond:expr, $msg:expr) => {
        if !$cond {
            $crate::test_bail!("assertion failed: {}", $msg);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::test_bail!(concat!("assertion failed: ", $fmt), $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! assert_eq_test {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            $crate::test_bail!("expected {:?}, got {:?}", right, left);
        }
    }};
    ($left:expr, $right:expr, $msg:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            $crate::test_bail!("{}: expected {:?}, got {:?}", $msg, right, left);
        }
    }};
}

#[macro_export]
macro_rules! assert_ne_test {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left == right {
            $crate::test_bail!("both sides are {:?}", left);
        }
    }};
    ($left:expr, $right:expr, $msg:expr) => {{
        let left = $left;
        let right = $right;
        if left == right {
            $crate::test_bail!("{}: both sides are {:?}", $msg, left);
        }
    }};
}

#[macro_export]
macro_rules! assert_not_null {
    ($ptr:expr) => {
        if $ptr.is_null() {
            $crate::test_bail!("unexpected null pointer");
        }
    };
    ($ptr:expr, $msg:expr) => {
        if $ptr.is_null() {
            $crate::test_bail!("unexpected null pointer: {}", $msg);
        }
    };
}
