//! Unit tests for Session

use core_types::{Experiment, Sample, SuiteSnapshot, Test};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use sandbox::{SandboxError, SandboxResult, TaskExecutor};
use session::{
    Delta, MemorySuiteStore, SessionError, Session, StoreError, StoreResult, SuiteStore,
};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scores each trial as the length of the test's code plus the call index.
#[derive(Default)]
struct Scripted {
    calls: AtomicUsize,
    fail_at: Option<usize>,
}

impl Scripted {
    fn failing_at(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_at: Some(call),
        }
    }
}

impl TaskExecutor for Scripted {
    fn execute(&self, _baseline: &str, test: &Test, _duration: Duration) -> SandboxResult<Sample> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(call) {
            return Err(SandboxError::TrialFailed {
                name: test.name.clone(),
                message: "boom".to_string(),
            });
        }
        Ok(Sample::of(test, test.code.len() as u64 * 10 + call as u64))
    }
}

/// Blocks every trial until the test releases it.
struct Gated {
    gate: Receiver<()>,
}

impl TaskExecutor for Gated {
    fn execute(&self, _baseline: &str, test: &Test, _duration: Duration) -> SandboxResult<Sample> {
        self.gate
            .recv_timeout(Duration::from_secs(10))
            .map_err(|_| SandboxError::NoReply)?;
        Ok(Sample::of(test, 7))
    }
}

fn gated() -> (Gated, Sender<()>) {
    let (release, gate) = channel::unbounded();
    (Gated { gate }, release)
}

/// A memory store whose writes fail while `broken` is set.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemorySuiteStore,
    broken: Arc<AtomicBool>,
}

impl SuiteStore for FlakyStore {
    fn list(&self) -> StoreResult<Vec<(String, SuiteSnapshot)>> {
        self.inner.list()
    }

    fn get(&self, id: &str) -> StoreResult<Option<SuiteSnapshot>> {
        self.inner.get(id)
    }

    fn put(&self, id: &str, snapshot: &SuiteSnapshot) -> StoreResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
        }
        self.inner.put(id, snapshot)
    }

    fn remove(&self, id: &str) -> StoreResult<bool> {
        self.inner.remove(id)
    }
}

fn small_experiment() -> Experiment {
    Experiment {
        tests: vec![Test::new("A", "a"), Test::new("B", "bb")],
        runs: 3,
        duration: Duration::from_millis(1),
        ..Experiment::default()
    }
}

#[test]
fn new_session_starts_from_default_experiment() {
    let session = Session::new(Scripted::default(), MemorySuiteStore::new()).unwrap();
    assert_eq!(session.state().title, "Finding numbers in an array");
    assert_eq!(session.state().runs, 100);
    assert!(!session.is_running());
    assert!(session.token().starts_with('#'));
}

#[test]
fn run_set_applies_mean_scores() {
    let mut session =
        Session::with_experiment(small_experiment(), Scripted::default(), MemorySuiteStore::new())
            .unwrap();
    assert!(session.start().unwrap());
    session.wait().unwrap();

    let state = session.state();
    assert!(!state.running);
    assert_eq!(state.progress, 6);
    // Calls 0,2,4 score "a" and 1,3,5 score "bb"
    assert_eq!(state.tests[0].ops, 10 + 2);
    assert_eq!(state.tests[1].ops, 20 + 3);
}

#[test]
fn failed_run_set_restores_previous_scores() {
    let mut experiment = small_experiment();
    experiment.tests[0].ops = 111;
    experiment.tests[1].ops = 222;
    let before = experiment.tests.clone();

    let mut session =
        Session::with_experiment(experiment, Scripted::failing_at(3), MemorySuiteStore::new())
            .unwrap();
    session.start().unwrap();
    let err = session.wait().unwrap_err();

    assert!(matches!(err, SessionError::Schedule(_)));
    assert!(!session.is_running());
    assert_eq!(session.state().tests, before);
    // One full run was reported before the failure
    assert_eq!(session.state().progress, 2);
}

#[test]
fn start_while_running_is_ignored() {
    let (executor, release) = gated();
    let mut session =
        Session::with_experiment(small_experiment(), executor, MemorySuiteStore::new()).unwrap();

    assert!(session.start().unwrap());
    assert!(session.is_running());
    assert!(!session.start().unwrap());

    for _ in 0..6 {
        release.send(()).unwrap();
    }
    session.wait().unwrap();
    assert_eq!(session.state().progress, 6);
    assert!(session.state().tests.iter().all(|t| t.ops == 7));
}

#[test]
fn poll_reports_in_flight_then_idle() {
    let (executor, release) = gated();
    let mut experiment = small_experiment();
    experiment.runs = 1;
    let mut session = Session::with_experiment(experiment, executor, MemorySuiteStore::new()).unwrap();

    assert!(!session.poll().unwrap());
    session.start().unwrap();
    assert!(session.poll().unwrap());
    assert_eq!(session.state().progress, 0);

    release.send(()).unwrap();
    release.send(()).unwrap();
    session.wait().unwrap();
    assert!(!session.poll().unwrap());
}

#[test]
fn start_resets_scores_immediately() {
    let (executor, release) = gated();
    let mut experiment = small_experiment();
    experiment.tests[0].ops = 50;
    let mut session = Session::with_experiment(experiment, executor, MemorySuiteStore::new()).unwrap();

    session.start().unwrap();
    assert!(session.state().tests.iter().all(|t| t.ops == 0));

    for _ in 0..6 {
        release.send(()).unwrap();
    }
    session.wait().unwrap();
}

#[test]
fn token_tracks_every_edit() {
    let mut session = Session::new(Scripted::default(), MemorySuiteStore::new()).unwrap();
    let first = session.token().to_string();

    session
        .dispatch(Delta::SetTitle("Another title".to_string()))
        .unwrap();
    assert_ne!(session.token(), first);

    let decoded = share_codec::decode(session.token()).unwrap();
    assert_eq!(decoded.title, "Another title");
    assert_eq!(decoded.id, session.state().id);
    assert_eq!(decoded.tests, session.state().tests);
}

#[test]
fn rejected_delta_leaves_state_untouched() {
    let mut session = Session::new(Scripted::default(), MemorySuiteStore::new()).unwrap();
    let before = session.state().clone();
    let token = session.token().to_string();

    assert!(matches!(
        session.dispatch(Delta::UpdateTest(9, Test::new("x", "y"))),
        Err(SessionError::NoSuchTest(9))
    ));
    assert!(matches!(
        session.dispatch(Delta::SetRuns(0)),
        Err(SessionError::InvalidConfig(_))
    ));
    assert_eq!(session.state(), &before);
    assert_eq!(session.token(), token);
}

#[test]
fn open_with_empty_fragment_uses_default() {
    for fragment in ["", "#"] {
        let session = Session::open(fragment, Scripted::default(), MemorySuiteStore::new()).unwrap();
        assert_eq!(session.state().tests.len(), 3);
    }
}

#[test]
fn open_decodes_share_token() {
    let tests = vec![Test::new("Spread", "[...data]")];
    let token = share_codec::encode("const data = [1]", &tests, "Copying", "abc123").unwrap();

    let session = Session::open(&token, Scripted::default(), MemorySuiteStore::new()).unwrap();
    let state = session.state();
    assert_eq!(state.id, "abc123");
    assert_eq!(state.title, "Copying");
    assert_eq!(state.baseline, "const data = [1]");
    assert_eq!(state.tests, tests);
    assert_eq!(state.runs, 100);
    assert_eq!(session.token(), token);
}

#[test]
fn open_rejects_malformed_token() {
    let err = Session::open("#YQ/bm90IGpzb24", Scripted::default(), MemorySuiteStore::new())
        .unwrap_err();
    assert!(matches!(err, SessionError::Codec(_)));
}

#[test]
fn unsaved_experiment_is_never_persisted() {
    let store = MemorySuiteStore::new();
    let mut session =
        Session::with_experiment(small_experiment(), Scripted::default(), store.clone()).unwrap();

    session.dispatch(Delta::SetTitle("Edited".to_string())).unwrap();
    session.start().unwrap();
    session.wait().unwrap();
    assert!(store.is_empty());
}

#[test]
fn saved_suite_follows_edits_and_results() {
    let store = MemorySuiteStore::new();
    let mut session =
        Session::with_experiment(small_experiment(), Scripted::default(), store.clone()).unwrap();
    let id = session.state().id.clone();

    session.save().unwrap();
    session
        .dispatch(Delta::AddTest(Test::new("C", "ccc")))
        .unwrap();
    assert_eq!(store.get(&id).unwrap().unwrap().tests.len(), 3);

    session.start().unwrap();
    session.wait().unwrap();
    let saved = store.get(&id).unwrap().unwrap();
    assert_eq!(saved.tests, session.state().tests);
    assert!(saved.tests.iter().all(|t| t.ops > 0));
}

#[test]
fn load_suite_replaces_content_and_identity() {
    let store = MemorySuiteStore::new();
    let mut first =
        Session::with_experiment(small_experiment(), Scripted::default(), store.clone()).unwrap();
    first.dispatch(Delta::SetTitle("Saved".to_string())).unwrap();
    first.save().unwrap();
    let saved_id = first.state().id.clone();

    let mut second = Session::new(Scripted::default(), store.clone()).unwrap();
    second.dispatch(Delta::SetRuns(5)).unwrap();
    second.load_suite(&saved_id).unwrap();

    assert_eq!(second.state().id, saved_id);
    assert_eq!(second.state().title, "Saved");
    assert_eq!(second.state().tests, first.state().tests);
    assert_eq!(second.state().runs, 5);

    assert!(matches!(
        second.load_suite("missing"),
        Err(SessionError::UnknownSuite(_))
    ));
}

#[test]
fn suites_are_listed_most_recent_first() {
    let store = MemorySuiteStore::new();
    let mut older = Session::new(Scripted::default(), store.clone()).unwrap();
    older.save().unwrap();
    std::thread::sleep(Duration::from_millis(5));
    let mut newer = Session::new(Scripted::default(), store.clone()).unwrap();
    newer.save().unwrap();

    let ids: Vec<String> = newer.suites().unwrap().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![newer.state().id.clone(), older.state().id.clone()]);

    assert!(newer.delete_suite(&older.state().id).unwrap());
    assert!(!newer.delete_suite(&older.state().id).unwrap());
    assert_eq!(newer.suites().unwrap().len(), 1);
}

#[test]
fn trials_run_through_the_given_executor_only_once_each() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    struct Logging(Arc<Mutex<Vec<String>>>);
    impl TaskExecutor for Logging {
        fn execute(&self, baseline: &str, test: &Test, _d: Duration) -> SandboxResult<Sample> {
            self.0.lock().push(format!("{baseline}|{}", test.code));
            Ok(Sample::of(test, 1))
        }
    }

    let mut experiment = small_experiment();
    experiment.runs = 2;
    experiment.baseline = "setup".to_string();
    let mut session =
        Session::with_experiment(experiment, Logging(Arc::clone(&seen)), MemorySuiteStore::new())
            .unwrap();
    session.start().unwrap();
    session.wait().unwrap();

    assert_eq!(
        *seen.lock(),
        vec!["setup|a", "setup|bb", "setup|a", "setup|bb"]
    );
}

#[test]
fn failed_start_leaves_session_idle_with_its_scores() {
    let store = FlakyStore::default();
    let mut experiment = small_experiment();
    experiment.tests[0].ops = 42;
    experiment.progress = 6;
    let before = experiment.clone();

    let mut session =
        Session::with_experiment(experiment, Scripted::default(), store.clone()).unwrap();
    session.save().unwrap();
    let token = session.token().to_string();
    store.broken.store(true, Ordering::SeqCst);

    let err = session.start().unwrap_err();
    assert!(matches!(err, SessionError::Store(_)));
    assert!(!session.is_running());
    assert_eq!(session.state(), &before);
    assert_eq!(session.token(), token);
    assert!(!session.poll().unwrap());

    // Once the store recovers the session can run again
    store.broken.store(false, Ordering::SeqCst);
    assert!(session.start().unwrap());
    session.wait().unwrap();
    assert!(!session.is_running());
    assert_eq!(session.state().progress, 6);
}

#[test]
fn failed_run_set_restores_duplicate_codes_individually() {
    let mut experiment = small_experiment();
    experiment.tests = vec![
        Test { ops: 5, ..Test::new("First", "x") },
        Test { ops: 7, ..Test::new("Second", "x") },
    ];
    let before = experiment.tests.clone();

    let mut session =
        Session::with_experiment(experiment, Scripted::failing_at(1), MemorySuiteStore::new())
            .unwrap();
    session.start().unwrap();
    assert!(session.wait().is_err());
    assert_eq!(session.state().tests, before);
}
