//! Test doubles for the command seam.
//!
//! [`MockRunner`] answers invocations from canned [`ExecutionResult`]s keyed
//! by the space-joined command line, and records every call so tests can
//! assert what was (or was not) run. [`Fixture`] loads captured transcripts
//! from `tests/fixtures/`.
//!
//! Fixture file format:
//!
//! ```text
//! # comment lines are ignored until the first section
//! exit: 100
//! --- stdout
//! Reading package lists...
//! --- stderr
//! E: Unable to locate package nonexistent-pkg-xyz
//! ```

use crate::error::{Result, SysPkgError};
use crate::exec::{CommandRequest, CommandRunner, ExecutionResult, InvocationError, RunControl};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    responses: HashMap<String, VecDeque<ExecutionResult>>,
    binaries: BTreeSet<String>,
    calls: Vec<String>,
}

/// Replays canned results; unmatched commands fail as "binary not found".
///
/// Several responses queued for one command line are handed out in order;
/// the last one stays in place for any further calls.
#[derive(Default)]
pub struct MockRunner {
    state: Mutex<MockState>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binary that `locate` finds and that answers `--version` with exit 0.
    pub fn with_binary(self, program: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.binaries.insert(program.to_string());
        }
        self
    }

    /// Queue `result` for the exact command line `command`.
    pub fn respond(&self, command: &str, result: ExecutionResult) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(program) = command.split(' ').next() {
                state.binaries.insert(program.to_string());
            }
            state
                .responses
                .entry(command.to_string())
                .or_default()
                .push_back(result);
        }
    }

    /// Queue a fixture for `command`.
    pub fn respond_fixture(&self, command: &str, fixture: &Fixture) {
        self.respond(command, fixture.result());
    }

    /// Command lines seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    fn answer(&self, request: &CommandRequest) -> ExecutionResult {
        let line = request.command_line();
        let Ok(mut state) = self.state.lock() else {
            return ExecutionResult::failed_to_run(InvocationError::SpawnFailed {
                program: request.program.clone(),
                reason: "mock state poisoned".to_string(),
            });
        };
        state.calls.push(line.clone());

        if let Some(queue) = state.responses.get_mut(&line) {
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if let Some(result) = next {
                return result;
            }
        }
        if request.args == ["--version"] && state.binaries.contains(&request.program) {
            return ExecutionResult::new(0, &format!("{} 0.0-mock\n", request.program), "");
        }
        ExecutionResult::failed_to_run(InvocationError::NotFound {
            program: request.program.clone(),
        })
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, request: &CommandRequest, _control: &RunControl) -> ExecutionResult {
        self.answer(request)
    }

    fn run_interactive(&self, request: &CommandRequest, _control: &RunControl) -> Result<i32> {
        let result = self.answer(request);
        match result.invocation_error {
            Some(err) => Err(err.into()),
            None => Ok(result.exit_code),
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        let state = self.state.lock().ok()?;
        state
            .binaries
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

/// A captured command transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Fixture {
    /// Parse the fixture text format described in the module docs.
    pub fn parse(text: &str) -> Result<Self> {
        enum Section {
            Header,
            Stdout,
            Stderr,
        }

        let mut exit_code = None;
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut section = Section::Header;

        for line in text.split_inclusive('\n') {
            let bare = line.trim_end_matches(['\n', '\r']);
            match bare {
                "--- stdout" => {
                    section = Section::Stdout;
                    continue;
                }
                "--- stderr" => {
                    section = Section::Stderr;
                    continue;
                }
                _ => {}
            }
            match section {
                Section::Header => {
                    let bare = bare.trim();
                    if bare.is_empty() || bare.starts_with('#') {
                        continue;
                    }
                    let code = bare
                        .strip_prefix("exit:")
                        .and_then(|c| c.trim().parse::<i32>().ok())
                        .ok_or_else(|| {
                            SysPkgError::Other(format!("bad fixture header line: {bare}"))
                        })?;
                    exit_code = Some(code);
                }
                Section::Stdout => stdout.push_str(line),
                Section::Stderr => stderr.push_str(line),
            }
        }

        Ok(Self {
            exit_code: exit_code
                .ok_or_else(|| SysPkgError::Other("fixture has no exit line".to_string()))?,
            stdout,
            stderr,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Load `tests/fixtures/<relative>` from the crate root.
    pub fn named(relative: &str) -> Result<Self> {
        Self::load(&Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(relative))
    }

    pub fn result(&self) -> ExecutionResult {
        ExecutionResult::new(self.exit_code, &self.stdout, &self.stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_commands_fail_to_run() {
        let mock = MockRunner::new();
        let result = mock.run(&CommandRequest::new("apt").arg("update"), &RunControl::default());
        assert!(matches!(
            result.invocation_error,
            Some(InvocationError::NotFound { .. })
        ));
        assert_eq!(mock.calls(), vec!["apt update".to_string()]);
    }

    #[test]
    fn queued_responses_then_sticky_last() {
        let mock = MockRunner::new();
        mock.respond("snap list", ExecutionResult::new(1, "", "first"));
        mock.respond("snap list", ExecutionResult::new(0, "second", ""));
        let req = CommandRequest::new("snap").arg("list");

        assert_eq!(mock.run(&req, &RunControl::default()).exit_code, 1);
        assert_eq!(mock.run(&req, &RunControl::default()).exit_code, 0);
        assert_eq!(mock.run(&req, &RunControl::default()).stdout_text(), "second");
    }

    #[test]
    fn binaries_answer_version_and_locate() {
        let mock = MockRunner::new().with_binary("apk");
        assert!(mock.locate("apk").is_some());
        assert!(mock.locate("apt").is_none());
        let result = mock.run(&CommandRequest::new("apk").arg("--version"), &RunControl::default());
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn fixture_sections() {
        let fixture = Fixture::parse(
            "# apt install on jammy\nexit: 100\n--- stdout\nReading package lists...\n--- stderr\nE: Unable to locate package x\n",
        )
        .unwrap();
        assert_eq!(fixture.exit_code, 100);
        assert_eq!(fixture.stdout, "Reading package lists...\n");
        assert_eq!(fixture.stderr, "E: Unable to locate package x\n");
    }

    #[test]
    fn fixture_requires_exit_line() {
        assert!(Fixture::parse("--- stdout\nhello\n").is_err());
        assert!(Fixture::parse("exit: nope\n").is_err());
    }
}
