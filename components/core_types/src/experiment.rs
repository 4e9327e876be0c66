//! Experiment state and run configuration.

use crate::Test;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_TITLE: &str = "Finding numbers in an array";
const DEFAULT_BASELINE: &str = "const data = [...Array(800).keys()]";

/// Generate a fresh opaque identity for an experiment.
///
/// # Examples
///
/// ```
/// use core_types::new_identity;
///
/// let a = new_identity();
/// let b = new_identity();
/// assert!(!a.is_empty());
/// assert_ne!(a, b);
/// ```
pub fn new_identity() -> String {
    Uuid::new_v4().simple().to_string()
}

/// How a run set is shaped: the number of runs and the wall-clock budget
/// of each trial.
///
/// # Examples
///
/// ```
/// use core_types::RunConfig;
/// use std::time::Duration;
///
/// let config = RunConfig::default().with_runs(10);
/// assert_eq!(config.runs, 10);
/// assert_eq!(config.duration, Duration::from_millis(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of runs; every run measures every test once
    pub runs: u32,
    /// Time budget of a single trial
    #[serde(with = "crate::millis", rename = "duration_ms")]
    pub duration: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            runs: 100,
            duration: Duration::from_millis(3),
        }
    }
}

impl RunConfig {
    /// Set the number of runs
    pub fn with_runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    /// Set the per-trial time budget
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether both the run count and the trial budget are positive
    pub fn is_valid(&self) -> bool {
        self.runs > 0 && !self.duration.is_zero()
    }
}

/// The complete state of one benchmarking session.
///
/// Only the session controller mutates an `Experiment`; the scheduler and
/// the executors receive copies of the pieces they need and hand results
/// back by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    /// Opaque identity, also the key of a saved suite
    pub id: String,
    /// Display title
    pub title: String,
    /// Setup source run once per trial before measurement
    pub baseline: String,
    /// Ordered snippets under comparison
    pub tests: Vec<Test>,
    /// Number of runs per run set
    pub runs: u32,
    /// Time budget of a single trial
    pub duration: Duration,
    /// Number of trials completed in the current run set
    pub progress: usize,
    /// Whether a run set is in flight
    pub running: bool,
}

impl Default for Experiment {
    fn default() -> Self {
        let config = RunConfig::default();
        Self {
            id: new_identity(),
            title: DEFAULT_TITLE.to_string(),
            baseline: DEFAULT_BASELINE.to_string(),
            tests: vec![
                Test::new("Find item 2000", "data.find(x => x == 200)"),
                Test::new("Find item 4000", "data.find(x => x == 400)"),
                Test::new("Find item 8000", "data.find(x => x == 800)"),
            ],
            runs: config.runs,
            duration: config.duration,
            progress: 0,
            running: false,
        }
    }
}

impl Experiment {
    /// The run shape of this experiment
    pub fn config(&self) -> RunConfig {
        RunConfig {
            runs: self.runs,
            duration: self.duration,
        }
    }

    /// Total number of trials a full run set will execute
    pub fn total_trials(&self) -> usize {
        self.runs as usize * self.tests.len()
    }
}
