//! Process sandbox integration tests
//!
//! A small shell script stands in for the script runtime: it consumes the
//! request and answers with a fixed sample for whatever test it was sent.

#![cfg(unix)]

use core_types::{Experiment, Test};
use integration_tests::init_tracing;
use sandbox::{ProcessConfig, ProcessSandbox};
use session::{MemorySuiteStore, Session, SessionError};
use std::time::Duration;

fn shell(script: &str) -> ProcessSandbox {
    ProcessSandbox::new(ProcessConfig::new("/bin/sh", ["-c", script]))
}

fn experiment() -> Experiment {
    Experiment {
        tests: vec![Test::new("A", "a()")],
        runs: 3,
        duration: Duration::from_millis(1),
        ..Experiment::default()
    }
}

#[test]
fn test_session_over_process_sandbox() {
    init_tracing();
    let sandbox = shell(r#"cat > /dev/null; printf '{"name":"A","code":"a()","ops":250}\n'"#);
    let mut session = Session::with_experiment(experiment(), sandbox, MemorySuiteStore::new()).unwrap();

    session.start().unwrap();
    session.wait().unwrap();
    assert_eq!(session.state().tests[0].ops, 250);
    assert_eq!(session.state().progress, 3);
}

#[test]
fn test_silent_process_fails_run_set() {
    init_tracing();
    let sandbox = shell("cat > /dev/null");
    let mut session = Session::with_experiment(experiment(), sandbox, MemorySuiteStore::new()).unwrap();

    session.start().unwrap();
    assert!(matches!(session.wait(), Err(SessionError::Schedule(_))));
    assert_eq!(session.state().tests[0].ops, 0);
}
