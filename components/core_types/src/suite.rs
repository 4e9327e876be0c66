//! Saved experiment snapshots.

use crate::{Experiment, Test};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, persisted copy of an experiment.
///
/// Snapshots are keyed by the experiment identity in a suite store; the
/// key is not part of the snapshot itself.
///
/// # Examples
///
/// ```
/// use core_types::{Experiment, SuiteSnapshot};
///
/// let experiment = Experiment::default();
/// let snapshot = SuiteSnapshot::capture(&experiment);
/// assert_eq!(snapshot.title, experiment.title);
/// assert_eq!(snapshot.tests, experiment.tests);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSnapshot {
    /// Display title at save time
    pub title: String,
    /// Setup source at save time
    pub baseline: String,
    /// Tests, with their scores, at save time
    pub tests: Vec<Test>,
    /// When the snapshot was last written
    pub updated: DateTime<Utc>,
}

impl SuiteSnapshot {
    /// Capture the persistable parts of `experiment`, stamped with now
    pub fn capture(experiment: &Experiment) -> Self {
        Self {
            title: experiment.title.clone(),
            baseline: experiment.baseline.clone(),
            tests: experiment.tests.clone(),
            updated: Utc::now(),
        }
    }
}
