//! Experiment sessions for Perflab
//!
//! A [`Session`] owns one [`core_types::Experiment`] and is the only place
//! it changes. It wires the trial scheduler, the aggregator, the share
//! token codec and a [`SuiteStore`] together:
//!
//! - edits are [`Delta`]s folded in by [`reduce`]
//! - [`Session::start`] runs a run set on a background thread and
//!   [`Session::poll`] / [`Session::wait`] apply its progress and result
//! - the share token is re-derived after every change
//! - a saved suite follows the experiment once [`Session::save`] has
//!   created it
//!
//! # Examples
//!
//! ```rust
//! use core_types::Test;
//! use sandbox::{NativeEngine, WorkerSandbox};
//! use session::{Delta, MemorySuiteStore, Session};
//! use std::time::Duration;
//!
//! let sandbox = WorkerSandbox::new(|| NativeEngine::new().with_snippet("noop", || {}));
//! let mut session = Session::new(sandbox, MemorySuiteStore::new()).unwrap();
//!
//! session.dispatch(Delta::SetBaseline(String::new())).unwrap();
//! session.dispatch(Delta::SetTests(vec![Test::new("No-op", "noop")])).unwrap();
//! session.dispatch(Delta::SetRuns(2)).unwrap();
//! session.dispatch(Delta::SetDuration(Duration::from_millis(1))).unwrap();
//!
//! assert!(session.start().unwrap());
//! session.wait().unwrap();
//! assert!(!session.is_running());
//! assert_eq!(session.state().progress, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod controller;
mod error;
mod state;
mod suites;

pub use controller::{RunEvent, Session};
pub use error::{SessionError, SessionResult};
pub use state::{apply_scores, reduce, restore_scores, Delta};
pub use suites::{FileSuiteStore, MemorySuiteStore, StoreError, StoreResult, SuiteStore};
