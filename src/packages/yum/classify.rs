use crate::core::outcome::{
    OperationOutcome, OutcomeKind, StderrRule, classify_failure, failure_detail,
};
use crate::core::types::OperationKind;
use crate::exec::ExecutionResult;

/// `check-update` exit status meaning "updates are available"
pub const UPDATES_AVAILABLE: i32 = 100;

/// dnf exit status for a transaction that could not take its lock
const LOCK_FAILURE: i32 = 200;

const RULES: &[StderrRule] = &[
    ("No match for argument", OutcomeKind::NotFound),
    ("Unable to find a match", OutcomeKind::NotFound),
    ("No matching Packages", OutcomeKind::NotFound),
    ("No package", OutcomeKind::NotFound),
    ("is not installed", OutcomeKind::NotFound),
    ("superuser privileges", OutcomeKind::PermissionDenied),
    ("You need to be root", OutcomeKind::PermissionDenied),
    ("Permission denied", OutcomeKind::PermissionDenied),
    ("No such command", OutcomeKind::UsageError),
    ("unrecognized arguments", OutcomeKind::UsageError),
    ("Command line error", OutcomeKind::UsageError),
];

/// Classify one yum, dnf or rpm invocation.
pub fn classify(operation: OperationKind, raw: &ExecutionResult) -> OperationOutcome {
    if raw.exit_code == 0 {
        return OperationOutcome::ok(raw);
    }

    let stderr = raw.stderr_text();
    let quiet_stderr = stderr.trim().is_empty();
    match operation {
        OperationKind::ListUpgradable if raw.exit_code == UPDATES_AVAILABLE => {
            OperationOutcome::ok(raw)
        }
        // rpm -q exits with the count of names it does not know and says so
        // on stdout; those become Unknown records
        OperationKind::Status if quiet_stderr && only_unknown_names(raw) => {
            OperationOutcome::ok(raw)
        }
        // rpm -V exits 1 when it found changed files
        OperationKind::Verify if raw.exit_code == 1 && quiet_stderr => OperationOutcome::ok(raw),
        _ if raw.exit_code == LOCK_FAILURE => {
            OperationOutcome::failure(OutcomeKind::PermissionDenied, failure_detail(raw), raw)
        }
        OperationKind::Search
            if stderr.contains("No matches found") || raw.stdout_text().contains("No matches found") =>
        {
            OperationOutcome::ok(raw)
        }
        _ => classify_failure(raw, RULES),
    }
}

/// Every name rpm reported missing accounts for the nonzero exit.
fn only_unknown_names(raw: &ExecutionResult) -> bool {
    let stdout = raw.stdout_text();
    let missing = stdout
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("package ") && l.ends_with(" is not installed"))
        .count();
    missing > 0 && usize::try_from(raw.exit_code).is_ok_and(|code| code <= missing)
}
