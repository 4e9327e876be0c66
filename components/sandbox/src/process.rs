//! Process-isolated trials.
//!
//! Each trial spawns a fresh child process, writes the request as one JSON
//! line to its stdin, closes stdin, and reads one JSON line back from its
//! stdout. The child is killed and reaped as soon as the reply (or the
//! failure standing in for it) is in hand.
//!
//! Every pipe is serviced by its own short-lived thread, so a child that
//! never reads its input cannot hold the caller past the reply timeout.

use crate::error::{SandboxError, SandboxResult};
use crate::executor::TaskExecutor;
use crate::protocol::TrialRequest;
use core_types::{Sample, Test};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

// Only the head of a crash report is kept; the rest is drained and dropped.
const STDERR_LIMIT: u64 = 4096;

// How long to wait for a pipe thread once the child is known to be gone.
const PIPE_GRACE: Duration = Duration::from_millis(200);

/// JavaScript harness run by the default `node` configuration
pub const HARNESS_SCRIPT: &str = include_str!("../harness/run.js");

/// How to launch the isolated process.
///
/// # Examples
///
/// ```
/// use sandbox::ProcessConfig;
///
/// let config = ProcessConfig::default();
/// assert_eq!(config.program, "node");
/// assert_eq!(config.args[0], "-e");
/// assert!(config.reply_timeout.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Program to execute
    pub program: String,
    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,
    /// Give up on a trial whose reply takes longer than this
    #[serde(default, with = "core_types::millis::option", rename = "reply_timeout_ms")]
    pub reply_timeout: Option<Duration>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["-e".to_string(), HARNESS_SCRIPT.to_string()],
            reply_timeout: None,
        }
    }
}

impl ProcessConfig {
    /// Launch `program` with `args` instead of the bundled harness
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            reply_timeout: None,
        }
    }

    /// Set the reply timeout
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }
}

/// Executor that measures each trial in a fresh child process
#[derive(Debug, Clone, Default)]
pub struct ProcessSandbox {
    config: ProcessConfig,
}

impl ProcessSandbox {
    /// Create a sandbox with the given launch configuration
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    /// The launch configuration
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    fn exchange(&self, child: &mut Child, request: &TrialRequest) -> SandboxResult<Sample> {
        let stdout = child.stdout.take().ok_or(SandboxError::NoReply)?;
        let replies = spawn_pipe_thread("trial-reply-reader", move || {
            let mut line = String::new();
            BufReader::new(stdout).read_line(&mut line).map(|_| line)
        })?;

        let mut payload = serde_json::to_vec(request)?;
        payload.push(b'\n');
        let writes = match child.stdin.take() {
            Some(mut stdin) => Some(spawn_pipe_thread("trial-request-writer", move || {
                stdin.write_all(&payload)
            })?),
            None => None,
        };

        let line = match self.config.reply_timeout {
            None => replies.recv().map_err(|_| SandboxError::NoReply)?,
            Some(limit) => replies.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => SandboxError::Timeout(limit),
                RecvTimeoutError::Disconnected => SandboxError::NoReply,
            })?,
        }?;

        let reply = line.trim();
        if reply.is_empty() {
            // A context that hung up mid-request is reported as the write failure.
            if let Some(Ok(Err(e))) = writes.map(|w| w.recv_timeout(PIPE_GRACE)) {
                return Err(SandboxError::Io(e));
            }
            return Err(SandboxError::NoReply);
        }
        Ok(serde_json::from_str(reply)?)
    }
}

/// Run `work` on a named thread and hand its result back through a channel
fn spawn_pipe_thread<T, F>(name: &str, work: F) -> SandboxResult<Receiver<io::Result<T>>>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    let (tx, rx) = channel::bounded(1);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _ = tx.send(work());
        })
        .map_err(SandboxError::Spawn)?;
    Ok(rx)
}

/// Keep the head of the child's error stream, draining the rest
fn collect_stderr(child: &mut Child) -> SandboxResult<Option<Receiver<io::Result<String>>>> {
    let Some(stderr) = child.stderr.take() else {
        return Ok(None);
    };
    spawn_pipe_thread("trial-stderr-reader", move || {
        let mut head = Vec::new();
        let mut stderr = stderr;
        (&mut stderr).take(STDERR_LIMIT).read_to_end(&mut head)?;
        io::copy(&mut stderr, &mut io::sink())?;
        Ok(String::from_utf8_lossy(&head).trim().to_string())
    })
    .map(Some)
}

fn teardown(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!(pid = child.id(), error = %e, "trial process already gone");
    }
    match child.wait() {
        Ok(status) => tracing::debug!(pid = child.id(), %status, "trial process reaped"),
        Err(e) => tracing::error!(pid = child.id(), error = %e, "failed to reap trial process"),
    }
}

impl TaskExecutor for ProcessSandbox {
    fn execute(&self, baseline: &str, test: &Test, duration: Duration) -> SandboxResult<Sample> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(SandboxError::Spawn)?;
        tracing::debug!(pid = child.id(), test = %test.name, "starting trial process");

        let diagnostics = match collect_stderr(&mut child) {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                teardown(&mut child);
                return Err(e);
            }
        };
        let outcome = self.exchange(&mut child, &TrialRequest::new(baseline, test, duration));
        teardown(&mut child);

        match (outcome, diagnostics) {
            (Err(SandboxError::NoReply), Some(diagnostics)) => {
                match diagnostics.recv_timeout(PIPE_GRACE) {
                    Ok(Ok(stderr)) if !stderr.is_empty() => {
                        tracing::warn!(test = %test.name, %stderr, "trial process crashed");
                        Err(SandboxError::Crashed { stderr })
                    }
                    _ => Err(SandboxError::NoReply),
                }
            }
            (outcome, _) => outcome,
        }
    }
}
