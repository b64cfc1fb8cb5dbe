use crate::core::outcome::OutcomeKind;
use crate::core::types::OperationKind;
use crate::exec::ExecutionResult;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SysPkgError {
    /// Caller-supplied package name or keyword rejected before any process spawn
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A manager command ran and was classified as a failure
    #[error("{manager} {operation} failed ({kind}): {detail}")]
    Operation {
        manager: String,
        operation: OperationKind,
        kind: OutcomeKind,
        detail: String,
        raw: Box<ExecutionResult>,
    },

    #[error("Could not start '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Command '{command}' timed out after {seconds} seconds")]
    TimedOut { command: String, seconds: u64 },

    #[error("Command '{command}' was cancelled")]
    Cancelled { command: String },

    #[error("Package manager not found: {0}")]
    ManagerNotFound(String),

    #[error("Package manager '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Config file not found at: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("KDL parse error: {0}")]
    KdlError(#[from] kdl::KdlError),

    #[error("IO error: {0}")]
    StdIoError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Lock acquisition failed (e.g., rwlock poisoned)
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("{0}")]
    Other(String),
}

impl SysPkgError {
    /// Outcome kind this error reports to the front-end.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Operation { kind, .. } => *kind,
            Self::Validation(_) | Self::ConfigError(_) | Self::KdlError(_) => {
                OutcomeKind::UsageError
            }
            Self::SpawnFailed { .. } | Self::ManagerNotFound(_) => OutcomeKind::Unavailable,
            Self::ConfigNotFound { .. } => OutcomeKind::NotFound,
            _ => OutcomeKind::GeneralError,
        }
    }

    /// Raw transcript behind a classified failure, for verbose diagnostics.
    pub fn raw(&self) -> Option<&ExecutionResult> {
        match self {
            Self::Operation { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SysPkgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_reports_its_kind() {
        let err = SysPkgError::Operation {
            manager: "apt".into(),
            operation: OperationKind::Install,
            kind: OutcomeKind::NotFound,
            detail: "E: Unable to locate package nope".into(),
            raw: Box::new(ExecutionResult::from_exit_code(100)),
        };
        assert_eq!(err.kind(), OutcomeKind::NotFound);
        assert!(err.raw().is_some());
        assert!(err.to_string().contains("apt install failed (not-found)"));
    }

    #[test]
    fn ambient_errors_map_onto_taxonomy() {
        assert_eq!(
            SysPkgError::Validation("x".into()).kind(),
            OutcomeKind::UsageError
        );
        assert_eq!(
            SysPkgError::SpawnFailed {
                program: "apk".into(),
                reason: "No such file or directory".into()
            }
            .kind(),
            OutcomeKind::Unavailable
        );
        assert_eq!(
            SysPkgError::Cancelled {
                command: "apt update".into()
            }
            .kind(),
            OutcomeKind::GeneralError
        );
    }
}
