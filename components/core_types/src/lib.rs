//! Core data model shared by every Perflab component.
//!
//! This crate provides the value types that flow between the trial
//! scheduler, the isolated executors, the share-token codec and the
//! experiment session.
//!
//! # Overview
//!
//! - [`Test`] - A named snippet and its last known throughput score
//! - [`Sample`] - One raw throughput measurement for one test in one run
//! - [`Experiment`] - The full session state owned by the controller
//! - [`RunConfig`] - How many runs to make and how long each trial lasts
//! - [`SuiteSnapshot`] - A saved copy of an experiment, keyed by identity
//!
//! # Examples
//!
//! ```
//! use core_types::{Experiment, Test};
//!
//! let mut experiment = Experiment::default();
//! experiment.tests.push(Test::new("Sum", "data.reduce((a, b) => a + b)"));
//! assert!(!experiment.running);
//! assert_eq!(experiment.tests.last().unwrap().ops, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod experiment;
mod suite;

pub mod millis;

pub use experiment::{new_identity, Experiment, RunConfig};
pub use suite::SuiteSnapshot;
pub use test::{Sample, Test};
