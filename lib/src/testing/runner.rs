use super::TestResult;
use crate::{klog_debug, klog_info};

/// Execute one test function and log its outcome.
///
/// Failures are logged at Info so they survive the default level filter;
/// passes log at Debug to keep full-suite output readable.
pub fn run_single_test(name: &str, test: impl FnOnce() -> TestResult) -> TestResult {
    let result = test();
    match result {
        TestResult::Pass => klog_debug!("TEST {}: PASS", name),
        TestResult::Fail => klog_info!("TEST {}: FAIL", name),
        TestResult::Skipped => klog_debug!("TEST {}: SKIPPED", name),
    }
    result
}
