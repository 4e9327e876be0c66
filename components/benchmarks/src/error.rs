//! Error types for the trial scheduler

use sandbox::SandboxError;
use thiserror::Error;

/// Why a run set was abandoned
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// One trial failed, which aborts every remaining trial of the run set
    #[error("trial for '{test}' failed in run {run}: {source}")]
    Trial {
        /// Zero-based run index
        run: u32,
        /// Name of the test whose trial failed
        test: String,
        /// Executor failure
        #[source]
        source: SandboxError,
    },
}

/// Result type for scheduler operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;
