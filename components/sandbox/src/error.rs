//! Error types for isolated execution

use std::time::Duration;
use thiserror::Error;

/// Failures of a single isolated trial.
///
/// None of these are retried: a failed trial aborts the run set it belongs
/// to.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The isolated context could not be created
    #[error("failed to start isolated context: {0}")]
    Spawn(#[source] std::io::Error),

    /// Reading from or writing to the context failed
    #[error("I/O error talking to isolated context: {0}")]
    Io(#[from] std::io::Error),

    /// The context sent something that is not a valid reply
    #[error("malformed message from isolated context: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The context reported that the trial itself failed
    #[error("trial '{name}' failed: {message}")]
    TrialFailed {
        /// Name of the test being measured
        name: String,
        /// Failure reported by the context
        message: String,
    },

    /// The context went away without sending its reply
    #[error("isolated context exited without replying")]
    NoReply,

    /// The context exited without replying and left a diagnostic behind
    #[error("isolated context exited without replying: {stderr}")]
    Crashed {
        /// What the context wrote to its error stream
        stderr: String,
    },

    /// The configured reply timeout elapsed
    #[error("isolated context did not reply within {0:?}")]
    Timeout(Duration),
}

/// Result type for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;
