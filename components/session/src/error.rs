//! Error types for the experiment session

use crate::suites::StoreError;
use benchmarks::ScheduleError;
use share_codec::CodecError;
use thiserror::Error;

/// Session-level errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// A share token could not be encoded or decoded
    #[error("share token error: {0}")]
    Codec(#[from] CodecError),

    /// A run set was aborted by a failing trial
    #[error("run set failed: {0}")]
    Schedule(#[from] ScheduleError),

    /// The suite store failed
    #[error("suite store error: {0}")]
    Store(#[from] StoreError),

    /// A test index is out of range
    #[error("no test at index {0}")]
    NoSuchTest(usize),

    /// Run count or trial duration is not positive
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// No saved suite has this identity
    #[error("no saved suite with id '{0}'")]
    UnknownSuite(String),

    /// The scheduler thread could not be started
    #[error("failed to start scheduler: {0}")]
    Spawn(#[source] std::io::Error),

    /// The scheduler thread went away without reporting a result
    #[error("scheduler stopped without reporting a result")]
    SchedulerLost,
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
