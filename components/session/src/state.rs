//! Experiment state transitions
//!
//! The session never mutates its [`Experiment`] in place; every change is a
//! [`Delta`] folded in by [`reduce`].

use crate::error::{SessionError, SessionResult};
use core_types::{Experiment, Test};
use share_codec::SharedState;
use std::collections::HashMap;
use std::time::Duration;

/// One change to an experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Replace the title
    SetTitle(String),
    /// Replace the baseline source
    SetBaseline(String),
    /// Replace the whole test list
    SetTests(Vec<Test>),
    /// Append a test
    AddTest(Test),
    /// Replace the test at an index
    UpdateTest(usize, Test),
    /// Remove the test at an index
    RemoveTest(usize),
    /// Change the number of runs
    SetRuns(u32),
    /// Change the per-trial budget
    SetDuration(Duration),
    /// Change the identity
    SetId(String),
    /// Replace every shareable field at once
    Load(SharedState),
    /// Enter the running state: progress and scores reset
    Start,
    /// Count trials completed by one run
    Progress(usize),
    /// Leave the running state with aggregated scores
    Finish(Vec<Test>),
    /// Leave the running state restoring the scores held before `Start`
    Abort(Vec<Test>),
}

/// Copy scores from `scores` onto `tests`, matching by code.
///
/// Tests whose code has no score keep their current value.
pub fn apply_scores(tests: &[Test], scores: &[Test]) -> Vec<Test> {
    let by_code: HashMap<&str, u64> = scores.iter().map(|s| (s.code.as_str(), s.ops)).collect();
    tests
        .iter()
        .map(|test| Test {
            ops: by_code.get(test.code.as_str()).copied().unwrap_or(test.ops),
            ..test.clone()
        })
        .collect()
}

/// Put back the scores `tests` held before a run set started.
///
/// While the list still lines up with `prior` code for code, scores are
/// restored by position so duplicated codes keep their own values. An
/// edited list falls back to matching by code.
pub fn restore_scores(tests: &[Test], prior: &[Test]) -> Vec<Test> {
    let aligned = tests.len() == prior.len()
        && tests.iter().zip(prior).all(|(test, old)| test.code == old.code);
    if !aligned {
        return apply_scores(tests, prior);
    }
    tests
        .iter()
        .zip(prior)
        .map(|(test, old)| Test {
            ops: old.ops,
            ..test.clone()
        })
        .collect()
}

fn check_index(state: &Experiment, index: usize) -> SessionResult<()> {
    if index < state.tests.len() {
        Ok(())
    } else {
        Err(SessionError::NoSuchTest(index))
    }
}

/// Apply `delta` to `state`, producing the next state.
///
/// `Start` on a running experiment returns it unchanged.
///
/// # Errors
/// Out-of-range test indices and non-positive run settings are rejected
/// and leave no partial change behind.
pub fn reduce(mut state: Experiment, delta: Delta) -> SessionResult<Experiment> {
    match delta {
        Delta::SetTitle(title) => state.title = title,
        Delta::SetBaseline(baseline) => state.baseline = baseline,
        Delta::SetTests(tests) => state.tests = tests,
        Delta::AddTest(test) => state.tests.push(test),
        Delta::UpdateTest(index, test) => {
            check_index(&state, index)?;
            state.tests[index] = test;
        }
        Delta::RemoveTest(index) => {
            check_index(&state, index)?;
            state.tests.remove(index);
        }
        Delta::SetRuns(0) => {
            return Err(SessionError::InvalidConfig("runs must be positive".to_string()))
        }
        Delta::SetRuns(runs) => state.runs = runs,
        Delta::SetDuration(duration) if duration.is_zero() => {
            return Err(SessionError::InvalidConfig(
                "trial duration must be positive".to_string(),
            ))
        }
        Delta::SetDuration(duration) => state.duration = duration,
        Delta::SetId(id) => state.id = id,
        Delta::Load(shared) => {
            state.baseline = shared.baseline;
            state.tests = shared.tests;
            state.title = shared.title;
            state.id = shared.id;
        }
        Delta::Start if state.running => {}
        Delta::Start => {
            state.running = true;
            state.progress = 0;
            state.tests = state.tests.iter().map(Test::reset).collect();
        }
        Delta::Progress(trials) => state.progress += trials,
        Delta::Finish(scores) => {
            state.running = false;
            state.tests = apply_scores(&state.tests, &scores);
        }
        Delta::Abort(prior) => {
            state.running = false;
            state.tests = restore_scores(&state.tests, &prior);
        }
    }
    Ok(state)
}
