//! Isolated trial execution for Perflab.
//!
//! Every trial runs in a freshly created context that is torn down as soon
//! as its single reply arrives, so no state leaks from one trial to the
//! next. Two kinds of context are provided:
//!
//! - [`WorkerSandbox`] - a dedicated OS thread hosting a fresh [`Engine`]
//! - [`ProcessSandbox`] - a child process speaking the JSON-lines protocol
//!   (by default `node` running the bundled harness)
//!
//! Both implement [`TaskExecutor`], the seam the trial scheduler drives.
//!
//! # Examples
//!
//! ```
//! use core_types::Test;
//! use sandbox::{NativeEngine, TaskExecutor, WorkerSandbox};
//! use std::time::Duration;
//!
//! let sandbox = WorkerSandbox::new(|| {
//!     NativeEngine::new().with_snippet("noop", || {})
//! });
//! let sample = sandbox
//!     .execute("", &Test::new("no-op", "noop"), Duration::from_millis(5))
//!     .unwrap();
//! assert!(sample.ops > 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod process;
pub mod protocol;
pub mod worker;

pub use error::{SandboxError, SandboxResult};
pub use executor::TaskExecutor;
pub use process::{ProcessConfig, ProcessSandbox, HARNESS_SCRIPT};
pub use protocol::{TrialRequest, TrialTest};
pub use worker::{Engine, EngineError, NativeEngine, WorkerSandbox};
