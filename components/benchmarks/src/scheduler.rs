//! Sequential trial scheduling
//!
//! Isolated contexts share the host CPU, so overlapping trials would
//! measure each other. The scheduler therefore issues exactly one trial at
//! a time: every test of run 0 in order, then every test of run 1, and so
//! on.

use crate::error::{ScheduleError, ScheduleResult};
use core_types::{Sample, Test};
use sandbox::TaskExecutor;
use std::time::Duration;

// Upper bound on the sample buffer reserved before the first trial.
const MAX_RESERVED_SAMPLES: usize = 64 * 1024;

/// Drives repeated trials through an executor, one at a time.
pub struct TrialScheduler<X> {
    executor: X,
}

impl<X: TaskExecutor> TrialScheduler<X> {
    /// Create a scheduler on top of `executor`
    pub fn new(executor: X) -> Self {
        Self { executor }
    }

    /// The executor trials are sent to
    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Run `runs` rounds of every test in `tests`.
    ///
    /// Each trial finishes before the next one is issued. After every
    /// completed run `on_run_complete` is called once with the number of
    /// trials that run contained.
    ///
    /// # Returns
    /// All samples in run-major order, `runs * tests.len()` of them
    ///
    /// # Errors
    /// The first failing trial aborts the run set and is returned; samples
    /// collected up to that point are discarded.
    pub fn run<F>(
        &self,
        baseline: &str,
        tests: &[Test],
        runs: u32,
        duration: Duration,
        mut on_run_complete: F,
    ) -> ScheduleResult<Vec<Sample>>
    where
        F: FnMut(usize),
    {
        tracing::info!(runs, tests = tests.len(), ?duration, "starting run set");
        let expected = (runs as usize).saturating_mul(tests.len());
        let mut samples = Vec::with_capacity(expected.min(MAX_RESERVED_SAMPLES));

        for run in 0..runs {
            for test in tests {
                let sample = self
                    .executor
                    .execute(baseline, test, duration)
                    .map_err(|source| {
                        tracing::warn!(run, test = %test.name, error = %source, "trial failed, aborting run set");
                        ScheduleError::Trial {
                            run,
                            test: test.name.clone(),
                            source,
                        }
                    })?;
                samples.push(sample);
            }
            tracing::debug!(run, "run complete");
            on_run_complete(tests.len());
        }

        tracing::info!(samples = samples.len(), "run set complete");
        Ok(samples)
    }
}
