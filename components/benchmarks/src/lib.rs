//! Benchmark orchestration for Perflab
//!
//! This crate turns a list of snippets into stable throughput scores:
//!
//! - The trial scheduler drives repeated, strictly sequential trials
//!   through a [`sandbox::TaskExecutor`]
//! - The sample aggregator folds the resulting samples into one score per
//!   distinct snippet
//!
//! # Examples
//!
//! ```rust
//! use benchmarks::{aggregate, TrialScheduler};
//! use core_types::Test;
//! use sandbox::{NativeEngine, WorkerSandbox};
//! use std::time::Duration;
//!
//! let sandbox = WorkerSandbox::new(|| NativeEngine::new().with_snippet("noop", || {}));
//! let tests = vec![Test::new("No-op", "noop")];
//!
//! let samples = TrialScheduler::new(sandbox)
//!     .run("", &tests, 3, Duration::from_millis(1), |_| {})
//!     .unwrap();
//! assert_eq!(samples.len(), 3);
//!
//! let scores = aggregate(&samples);
//! assert_eq!(scores.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod error;
pub mod scheduler;

pub use aggregate::{aggregate, aggregate_with, Statistic};
pub use error::{ScheduleError, ScheduleResult};
pub use scheduler::TrialScheduler;
