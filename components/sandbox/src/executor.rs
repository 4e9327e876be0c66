//! The executor seam between the scheduler and an isolated context.

use crate::error::SandboxResult;
use core_types::{Sample, Test};
use std::sync::Arc;
use std::time::Duration;

/// Runs one test in a fresh isolated context and returns its sample.
///
/// Implementations must create a new context per call, run `baseline`
/// once, execute `test.code` repeatedly for `duration` of wall-clock time,
/// and tear the context down after its reply whether or not the trial
/// succeeded.
///
/// Calls are independent of each other; callers decide whether to issue
/// them one at a time.
pub trait TaskExecutor: Send + Sync {
    /// Measure `test` under `baseline` for `duration`
    fn execute(&self, baseline: &str, test: &Test, duration: Duration) -> SandboxResult<Sample>;
}

impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    fn execute(&self, baseline: &str, test: &Test, duration: Duration) -> SandboxResult<Sample> {
        (**self).execute(baseline, test, duration)
    }
}

impl<T: TaskExecutor + ?Sized> TaskExecutor for &T {
    fn execute(&self, baseline: &str, test: &Test, duration: Duration) -> SandboxResult<Sample> {
        (**self).execute(baseline, test, duration)
    }
}
