pub mod args;
pub mod dispatcher;

pub use args::{Cli, Command, GlobalFlags};

use crate::core::outcome::OutcomeKind;
use crate::error::SysPkgError;

/// Process exit status of one `syspkg` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// The operation (or every manager in a fan-out) failed
    Failure,
    /// Bad arguments or settings
    Usage,
    /// Some managers in a fan-out failed, others succeeded
    PartialFailure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Usage => 2,
            Self::PartialFailure => 3,
        }
    }

    pub fn from_error(err: &SysPkgError) -> Self {
        match err.kind() {
            OutcomeKind::UsageError => Self::Usage,
            _ => Self::Failure,
        }
    }
}
