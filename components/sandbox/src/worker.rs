//! Thread-isolated trials.
//!
//! Each trial gets its own OS thread and its own [`Engine`] instance, built
//! by the factory inside the new thread. The caller posts one
//! [`TrialRequest`], receives one [`WorkerMessage`] back, and the thread is
//! joined before `execute` returns.

use crate::error::{SandboxError, SandboxResult};
use crate::executor::TaskExecutor;
use crate::protocol::TrialRequest;
use core_types::{Sample, Test};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error raised by an engine while preparing or running a snippet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    /// Create an engine error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Something that can evaluate snippets inside a worker thread.
///
/// An engine is created fresh for every trial and dropped when the trial
/// ends, so it may keep whatever state the baseline sets up.
pub trait Engine {
    /// Run the baseline source once before measurement starts
    fn prepare(&mut self, baseline: &str) -> Result<(), EngineError>;

    /// Execute the test source once
    fn run_once(&mut self, code: &str) -> Result<(), EngineError>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn prepare(&mut self, baseline: &str) -> Result<(), EngineError> {
        (**self).prepare(baseline)
    }

    fn run_once(&mut self, code: &str) -> Result<(), EngineError> {
        (**self).run_once(code)
    }
}

type Snippet = Arc<dyn Fn() + Send + Sync>;

/// An engine whose "source text" names native Rust closures.
///
/// Useful for racing Rust implementations against each other, and as the
/// reference engine for exercising the scheduler. An empty baseline is
/// always accepted; any other source must name a registered snippet.
///
/// # Examples
///
/// ```
/// use sandbox::{Engine, NativeEngine};
///
/// let mut engine = NativeEngine::new().with_snippet("sum", || {
///     std::hint::black_box((0..100u32).sum::<u32>());
/// });
/// engine.prepare("").unwrap();
/// engine.run_once("sum").unwrap();
/// assert!(engine.run_once("missing").is_err());
/// ```
#[derive(Clone, Default)]
pub struct NativeEngine {
    snippets: HashMap<String, Snippet>,
}

impl NativeEngine {
    /// Create an engine with no snippets
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` under the source text `code`
    pub fn with_snippet<F>(mut self, code: impl Into<String>, body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.snippets.insert(code.into(), Arc::new(body));
        self
    }

    fn call(&self, code: &str) -> Result<(), EngineError> {
        let snippet = self
            .snippets
            .get(code.trim())
            .ok_or_else(|| EngineError::new(format!("unknown snippet: {code}")))?;
        snippet();
        Ok(())
    }
}

impl Engine for NativeEngine {
    fn prepare(&mut self, baseline: &str) -> Result<(), EngineError> {
        if baseline.trim().is_empty() {
            return Ok(());
        }
        self.call(baseline)
    }

    fn run_once(&mut self, code: &str) -> Result<(), EngineError> {
        self.call(code)
    }
}

/// Message sent from a worker thread back to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Trial finished with a sample
    Reply(Sample),
    /// The engine failed during the trial
    Failed(String),
}

/// Run the baseline once, then the test code until the budget is spent.
fn measure(engine: &mut dyn Engine, request: &TrialRequest) -> Result<u64, EngineError> {
    engine.prepare(&request.baseline)?;
    let deadline = Instant::now() + request.duration;
    let mut ops = 0u64;
    while Instant::now() < deadline {
        engine.run_once(&request.test.code)?;
        ops += 1;
    }
    Ok(ops)
}

type EngineFactory = dyn Fn() -> Box<dyn Engine> + Send + Sync;

/// A single-use worker thread.
struct Worker {
    id: u64,
    sender: Option<Sender<TrialRequest>>,
    receiver: Receiver<WorkerMessage>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn spawn(factory: Arc<EngineFactory>) -> SandboxResult<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);

        let (to_worker_tx, to_worker_rx) = channel::bounded(1);
        let (from_worker_tx, from_worker_rx) = channel::bounded(1);

        let handle = thread::Builder::new()
            .name(format!("trial-worker-{id}"))
            .spawn(move || Self::worker_thread_main(factory, to_worker_rx, from_worker_tx))
            .map_err(SandboxError::Spawn)?;

        Ok(Self {
            id,
            sender: Some(to_worker_tx),
            receiver: from_worker_rx,
            thread_handle: Some(handle),
        })
    }

    fn worker_thread_main(
        factory: Arc<EngineFactory>,
        rx: Receiver<TrialRequest>,
        tx: Sender<WorkerMessage>,
    ) {
        // One request per worker; a closed channel means the owner gave up.
        let Ok(request) = rx.recv() else {
            return;
        };
        let mut engine = factory();
        let message = match measure(engine.as_mut(), &request) {
            Ok(ops) => WorkerMessage::Reply(Sample {
                name: request.test.name,
                code: request.test.code,
                ops,
            }),
            Err(e) => WorkerMessage::Failed(e.0),
        };
        let _ = tx.send(message);
    }

    fn post(&self, request: TrialRequest) -> SandboxResult<()> {
        self.sender
            .as_ref()
            .ok_or(SandboxError::NoReply)?
            .send(request)
            .map_err(|_| SandboxError::NoReply)
    }

    fn receive(&self, timeout: Option<Duration>) -> SandboxResult<WorkerMessage> {
        match timeout {
            None => self.receiver.recv().map_err(|_| SandboxError::NoReply),
            Some(limit) => self.receiver.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => SandboxError::Timeout(limit),
                RecvTimeoutError::Disconnected => SandboxError::NoReply,
            }),
        }
    }

    /// Tear the worker down.
    ///
    /// With `wait` the thread is joined; it has already replied or died, so
    /// the join is short. Without it a thread that is still measuring is
    /// detached, since it cannot be interrupted, and exits once its engine
    /// returns.
    fn terminate(&mut self, wait: bool) {
        self.sender.take();
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        if wait || handle.is_finished() {
            if handle.join().is_err() {
                tracing::error!(worker = self.id, "trial worker panicked");
            }
        } else {
            tracing::warn!(worker = self.id, "detaching trial worker that is still running");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.terminate(false);
    }
}

/// Executor that measures each trial on a fresh worker thread.
///
/// # Examples
///
/// ```
/// use sandbox::{NativeEngine, WorkerSandbox};
/// use std::time::Duration;
///
/// let sandbox = WorkerSandbox::new(NativeEngine::new)
///     .with_reply_timeout(Duration::from_secs(5));
/// assert_eq!(sandbox.reply_timeout(), Some(Duration::from_secs(5)));
/// ```
pub struct WorkerSandbox {
    factory: Arc<EngineFactory>,
    reply_timeout: Option<Duration>,
}

impl WorkerSandbox {
    /// Create a sandbox that builds a new engine with `factory` per trial
    pub fn new<F, E>(factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: Engine + 'static,
    {
        Self {
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Engine>),
            reply_timeout: None,
        }
    }

    /// Fail a trial with [`SandboxError::Timeout`] if no reply arrives in time
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    /// The configured reply timeout, if any
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout
    }
}

impl TaskExecutor for WorkerSandbox {
    fn execute(&self, baseline: &str, test: &Test, duration: Duration) -> SandboxResult<Sample> {
        let mut worker = Worker::spawn(Arc::clone(&self.factory))?;
        tracing::debug!(worker = worker.id, test = %test.name, "starting trial");

        let outcome = worker
            .post(TrialRequest::new(baseline, test, duration))
            .and_then(|()| worker.receive(self.reply_timeout));
        let timed_out = matches!(outcome, Err(SandboxError::Timeout(_)));
        worker.terminate(!timed_out);

        match outcome? {
            WorkerMessage::Reply(sample) => Ok(sample),
            WorkerMessage::Failed(message) => Err(SandboxError::TrialFailed {
                name: test.name.clone(),
                message,
            }),
        }
    }
}
