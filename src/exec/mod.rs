//! # Command Execution
//!
//! Every manager adapter talks to the outside world through the
//! [`CommandRunner`] trait. Production code uses [`SystemRunner`], which
//! spawns real processes; tests use [`crate::testing::MockRunner`], which
//! replays captured transcripts.
//!
//! Arguments are always passed as an argv vector straight to `exec`. Nothing
//! is ever routed through a shell, so package names cannot be reinterpreted
//! as shell syntax.
//!
//! A nonzero exit code is data, not an error: [`CommandRunner::run`] always
//! returns an [`ExecutionResult`]. Only when no exit status exists at all
//! (binary missing, deadline hit, cancelled) is `invocation_error` set.

pub mod system;

pub use system::SystemRunner;

use crate::error::{Result, SysPkgError};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default deadline for one external invocation (10 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// One program invocation: argv plus environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Plain space-joined command line, used as the lookup key for canned
    /// responses and in error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Shell-quoted rendering for logs. Never executed.
    pub fn display(&self) -> String {
        let parts = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(parts).unwrap_or_else(|_| self.command_line())
    }
}

/// Why an invocation produced no exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// Binary not found on PATH
    NotFound { program: String },
    SpawnFailed { program: String, reason: String },
    TimedOut { command: String, seconds: u64 },
    Cancelled { command: String },
}

impl From<InvocationError> for SysPkgError {
    fn from(err: InvocationError) -> Self {
        match err {
            InvocationError::NotFound { program } => SysPkgError::SpawnFailed {
                program,
                reason: "binary not found on PATH".to_string(),
            },
            InvocationError::SpawnFailed { program, reason } => {
                SysPkgError::SpawnFailed { program, reason }
            }
            InvocationError::TimedOut { command, seconds } => {
                SysPkgError::TimedOut { command, seconds }
            }
            InvocationError::Cancelled { command } => SysPkgError::Cancelled { command },
        }
    }
}

/// Captured output of one invocation.
///
/// When `invocation_error` is set the exit code means nothing and the result
/// must not be classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub invocation_error: Option<InvocationError>,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            invocation_error: None,
        }
    }

    /// Result of an interactive run: exit code only, no captured streams.
    pub fn from_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn failed_to_run(error: InvocationError) -> Self {
        Self {
            exit_code: -1,
            invocation_error: Some(error),
            ..Default::default()
        }
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// stdout followed by stderr, for parsers that read both streams.
    pub fn combined_text(&self) -> String {
        let mut text = self.stdout_text();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr_text());
        text
    }
}

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation applied to one invocation.
#[derive(Debug, Clone)]
pub struct RunControl {
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl Default for RunControl {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }
}

impl RunControl {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Abstraction over external command execution.
pub trait CommandRunner: Send + Sync {
    /// Run with captured stdout/stderr. Never fails on a nonzero exit.
    fn run(&self, request: &CommandRequest, control: &RunControl) -> ExecutionResult;

    /// Run with the caller's terminal attached. Returns only the exit code.
    fn run_interactive(&self, request: &CommandRequest, control: &RunControl) -> Result<i32>;

    /// Resolve a program on PATH.
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}
