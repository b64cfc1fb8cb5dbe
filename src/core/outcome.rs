//! Normalized classification of one command invocation.
//!
//! Each manager's classifier turns an [`ExecutionResult`] into an
//! [`OperationOutcome`]. Only `OutcomeKind::Ok` lets a parser run; every other
//! kind becomes a typed [`SysPkgError::Operation`].

use crate::core::types::OperationKind;
use crate::error::{Result, SysPkgError};
use crate::exec::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Ok,
    NotFound,
    PermissionDenied,
    UsageError,
    Unavailable,
    GeneralError,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::NotFound => "not-found",
            Self::PermissionDenied => "permission-denied",
            Self::UsageError => "usage-error",
            Self::Unavailable => "unavailable",
            Self::GeneralError => "general-error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub kind: OutcomeKind,
    pub detail: String,
    pub raw: ExecutionResult,
}

impl OperationOutcome {
    pub fn ok(raw: &ExecutionResult) -> Self {
        Self {
            kind: OutcomeKind::Ok,
            detail: String::new(),
            raw: raw.clone(),
        }
    }

    pub fn failure(kind: OutcomeKind, detail: String, raw: &ExecutionResult) -> Self {
        Self {
            kind,
            detail,
            raw: raw.clone(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind == OutcomeKind::Ok
    }

    /// Hand back the raw result on `Ok`, or the typed failure otherwise.
    pub fn into_result(self, manager: &str, operation: OperationKind) -> Result<ExecutionResult> {
        if self.kind == OutcomeKind::Ok {
            return Ok(self.raw);
        }
        Err(SysPkgError::Operation {
            manager: manager.to_string(),
            operation,
            kind: self.kind,
            detail: self.detail,
            raw: Box::new(self.raw),
        })
    }
}

/// Case-insensitive stderr substring rule.
pub type StderrRule = (&'static str, OutcomeKind);

/// Match stderr against ordered rules; the first hit wins.
///
/// Returns `None` when nothing matches so the caller decides the fallback.
/// Specific kinds are opt-in: an unrecognized message never guesses.
pub fn match_stderr(stderr: &str, rules: &[StderrRule]) -> Option<OutcomeKind> {
    let haystack = stderr.to_lowercase();
    rules
        .iter()
        .find(|(needle, _)| haystack.contains(&needle.to_lowercase()))
        .map(|(_, kind)| *kind)
}

/// Classify a failed result with rules, defaulting to `GeneralError`.
pub fn classify_failure(raw: &ExecutionResult, rules: &[StderrRule]) -> OperationOutcome {
    let stderr = raw.stderr_text();
    let kind = match_stderr(&stderr, rules).unwrap_or(OutcomeKind::GeneralError);
    OperationOutcome::failure(kind, failure_detail(raw), raw)
}

/// Human-readable excerpt of a failure.
///
/// Prefers lines the tools mark as errors (`E:`, `error:`, `ERROR:`), then
/// the first non-empty stderr line, then stdout, then the bare exit code.
pub fn failure_detail(raw: &ExecutionResult) -> String {
    let stderr = raw.stderr_text();
    let error_lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| {
            let lower = l.to_lowercase();
            lower.starts_with("e:") || lower.starts_with("error")
        })
        .collect();
    if !error_lines.is_empty() {
        return error_lines.join("; ");
    }

    let first_line = |text: &str| {
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with("WARNING: apt does not have a stable CLI"))
            .map(str::to_string)
    };

    first_line(&stderr)
        .or_else(|| first_line(&raw.stdout_text()))
        .unwrap_or_else(|| format!("exit status {}", raw.exit_code))
}
