//! The experiment session
//!
//! [`Session`] is the single owner of an [`Experiment`]. Edits and run
//! results arrive as [`Delta`]s; after each one the share token is
//! re-derived and, if the experiment has a saved suite, that suite is
//! brought up to date.
//!
//! A run set executes on a background scheduler thread. The thread never
//! touches the experiment: it emits [`RunEvent`]s on a channel that the
//! session drains in [`Session::poll`] or [`Session::wait`].

use crate::error::{SessionError, SessionResult};
use crate::state::{reduce, Delta};
use crate::suites::SuiteStore;
use benchmarks::{aggregate_with, ScheduleResult, Statistic, TrialScheduler};
use core_types::{Experiment, Sample, SuiteSnapshot, Test};
use crossbeam::channel::{self, Receiver, RecvError, TryRecvError};
use sandbox::TaskExecutor;
use share_codec::SharedState;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A message from the scheduler thread to its session
#[derive(Debug)]
pub enum RunEvent {
    /// One run finished; carries the number of trials it contained
    Progress(usize),
    /// The run set ended
    Finished(ScheduleResult<Vec<Sample>>),
}

struct PendingRun {
    events: Receiver<RunEvent>,
    // Scores held before the run started, restored if it fails
    prior: Vec<Test>,
    handle: JoinHandle<()>,
}

/// Owns one experiment and drives its run sets.
pub struct Session {
    state: Experiment,
    token: String,
    statistic: Statistic,
    executor: Arc<dyn TaskExecutor>,
    store: Box<dyn SuiteStore>,
    pending: Option<PendingRun>,
}

impl Session {
    /// Start a session on the default experiment
    pub fn new<X, S>(executor: X, store: S) -> SessionResult<Self>
    where
        X: TaskExecutor + 'static,
        S: SuiteStore + 'static,
    {
        Self::with_experiment(Experiment::default(), executor, store)
    }

    /// Start a session on `experiment`
    pub fn with_experiment<X, S>(experiment: Experiment, executor: X, store: S) -> SessionResult<Self>
    where
        X: TaskExecutor + 'static,
        S: SuiteStore + 'static,
    {
        let token = SharedState::from(&experiment).encode()?;
        Ok(Self {
            state: experiment,
            token,
            statistic: Statistic::default(),
            executor: Arc::new(executor),
            store: Box::new(store),
            pending: None,
        })
    }

    /// Start a session from a location fragment.
    ///
    /// An empty fragment (with or without `#`) opens the default
    /// experiment. Anything else is decoded as a share token on top of the
    /// default run configuration.
    ///
    /// # Errors
    /// A malformed token is returned as [`SessionError::Codec`]; callers
    /// that want the default experiment instead can fall back to
    /// [`Session::new`].
    pub fn open<X, S>(fragment: &str, executor: X, store: S) -> SessionResult<Self>
    where
        X: TaskExecutor + 'static,
        S: SuiteStore + 'static,
    {
        if fragment.trim_start_matches('#').is_empty() {
            return Self::new(executor, store);
        }
        let shared = share_codec::decode(fragment)?;
        let experiment = Experiment {
            id: shared.id,
            title: shared.title,
            baseline: shared.baseline,
            tests: shared.tests,
            ..Experiment::default()
        };
        tracing::debug!(id = %experiment.id, "session opened from share token");
        Self::with_experiment(experiment, executor, store)
    }

    /// Choose how trial samples are folded into scores
    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    /// The current experiment
    pub fn state(&self) -> &Experiment {
        &self.state
    }

    /// The share token for the current experiment
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether a run set is in flight
    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Apply one change to the experiment.
    ///
    /// # Errors
    /// A rejected delta leaves the experiment untouched. Store failures
    /// during the suite sync are returned after the change was applied.
    pub fn dispatch(&mut self, delta: Delta) -> SessionResult<()> {
        let before = SharedState::from(&self.state);
        self.state = reduce(self.state.clone(), delta)?;

        let after = SharedState::from(&self.state);
        self.token = after.encode()?;
        if after != before {
            self.sync_suite()?;
        }
        Ok(())
    }

    // Update-only: a suite is never created here.
    fn sync_suite(&self) -> SessionResult<()> {
        let id = &self.state.id;
        if self.store.get(id)?.is_some() {
            self.store.put(id, &SuiteSnapshot::capture(&self.state))?;
            tracing::debug!(id = %id, "saved suite updated");
        }
        Ok(())
    }

    /// Start a run set on a background thread.
    ///
    /// # Returns
    /// `false` without doing anything if a run set is already in flight
    ///
    /// # Errors
    /// If the run set cannot be launched the session is put back exactly as
    /// it was, idle and with its previous scores.
    pub fn start(&mut self) -> SessionResult<bool> {
        if self.state.running {
            tracing::debug!("run set already in flight, ignoring start");
            return Ok(false);
        }

        let state = self.state.clone();
        let token = self.token.clone();
        match self.launch(state.tests.clone()) {
            Ok(run) => {
                self.pending = Some(run);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "run set could not start, restoring previous state");
                self.restore(state, token);
                Err(e)
            }
        }
    }

    fn launch(&mut self, prior: Vec<Test>) -> SessionResult<PendingRun> {
        self.dispatch(Delta::Start)?;

        let (sender, events) = channel::unbounded();
        let executor = Arc::clone(&self.executor);
        let baseline = self.state.baseline.clone();
        let tests = self.state.tests.clone();
        let runs = self.state.runs;
        let duration = self.state.duration;

        let handle = thread::Builder::new()
            .name("trial-scheduler".to_string())
            .spawn(move || {
                let scheduler = TrialScheduler::new(executor);
                let result = scheduler.run(&baseline, &tests, runs, duration, |trials| {
                    let _ = sender.send(RunEvent::Progress(trials));
                });
                // The session may have been dropped; nobody is left to tell
                let _ = sender.send(RunEvent::Finished(result));
            })
            .map_err(SessionError::Spawn)?;

        Ok(PendingRun {
            events,
            prior,
            handle,
        })
    }

    fn restore(&mut self, state: Experiment, token: String) {
        self.state = state;
        self.token = token;
        if let Err(e) = self.sync_suite() {
            tracing::warn!(id = %self.state.id, error = %e, "saved suite not restored");
        }
    }

    /// Apply every run event that has already arrived, without blocking.
    ///
    /// # Returns
    /// Whether a run set is still in flight
    ///
    /// # Errors
    /// The run set's failure, once it has been applied
    pub fn poll(&mut self) -> SessionResult<bool> {
        loop {
            let event = match &self.pending {
                None => return Ok(false),
                Some(run) => match run.events.try_recv() {
                    Ok(event) => Some(event),
                    Err(TryRecvError::Empty) => return Ok(true),
                    Err(TryRecvError::Disconnected) => None,
                },
            };
            self.apply(event)?;
        }
    }

    /// Block until the current run set, if any, has ended.
    ///
    /// # Errors
    /// The run set's failure, once it has been applied
    pub fn wait(&mut self) -> SessionResult<()> {
        loop {
            let event = match &self.pending {
                None => return Ok(()),
                Some(run) => match run.events.recv() {
                    Ok(event) => Some(event),
                    Err(RecvError) => None,
                },
            };
            self.apply(event)?;
        }
    }

    // `None` means the scheduler hung up without a result.
    fn apply(&mut self, event: Option<RunEvent>) -> SessionResult<()> {
        let result = match event {
            Some(RunEvent::Progress(trials)) => return self.dispatch(Delta::Progress(trials)),
            Some(RunEvent::Finished(result)) => result.map_err(SessionError::from),
            None => Err(SessionError::SchedulerLost),
        };

        let Some(run) = self.pending.take() else {
            return Ok(());
        };
        if run.handle.join().is_err() {
            tracing::error!("scheduler thread panicked");
        }

        match result {
            Ok(samples) => {
                let scores = aggregate_with(&samples, self.statistic);
                tracing::info!(
                    samples = samples.len(),
                    tests = scores.len(),
                    "run set applied"
                );
                self.dispatch(Delta::Finish(scores))
            }
            Err(e) => {
                tracing::warn!(error = %e, "run set failed, restoring previous scores");
                self.dispatch(Delta::Abort(run.prior))?;
                Err(e)
            }
        }
    }

    /// Save the current experiment as a suite under its identity.
    ///
    /// This is the only way a suite is created; afterwards every change is
    /// synced to it automatically.
    pub fn save(&mut self) -> SessionResult<()> {
        let snapshot = SuiteSnapshot::capture(&self.state);
        self.store.put(&self.state.id, &snapshot)?;
        tracing::info!(id = %self.state.id, title = %snapshot.title, "suite saved");
        Ok(())
    }

    /// Every saved suite, most recently updated first
    pub fn suites(&self) -> SessionResult<Vec<(String, SuiteSnapshot)>> {
        let mut suites = self.store.list()?;
        suites.sort_by(|(a_id, a), (b_id, b)| b.updated.cmp(&a.updated).then_with(|| a_id.cmp(b_id)));
        Ok(suites)
    }

    /// Replace the current experiment's identity and content with a saved
    /// suite. Run configuration is kept.
    ///
    /// # Errors
    /// [`SessionError::UnknownSuite`] if nothing is saved under `id`
    pub fn load_suite(&mut self, id: &str) -> SessionResult<()> {
        let snapshot = self
            .store
            .get(id)?
            .ok_or_else(|| SessionError::UnknownSuite(id.to_string()))?;
        self.dispatch(Delta::Load(SharedState {
            baseline: snapshot.baseline,
            tests: snapshot.tests,
            title: snapshot.title,
            id: id.to_string(),
        }))
    }

    /// Delete a saved suite
    ///
    /// # Returns
    /// Whether a suite was saved under `id`
    pub fn delete_suite(&mut self, id: &str) -> SessionResult<bool> {
        let removed = self.store.remove(id)?;
        if removed {
            tracing::info!(id, "suite deleted");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("token", &self.token)
            .field("statistic", &self.statistic)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
