use crate::core::outcome::{OperationOutcome, OutcomeKind, StderrRule, classify_failure};
use crate::core::types::OperationKind;
use crate::exec::ExecutionResult;

const RULES: &[StderrRule] = &[
    ("unable to select packages", OutcomeKind::NotFound),
    ("no such package", OutcomeKind::NotFound),
    ("is not installed", OutcomeKind::NotFound),
    ("Permission denied", OutcomeKind::PermissionDenied),
    ("Unable to lock database", OutcomeKind::PermissionDenied),
    ("Operation not permitted", OutcomeKind::PermissionDenied),
    ("unrecognized option", OutcomeKind::UsageError),
    ("unknown option", OutcomeKind::UsageError),
    ("usage: apk", OutcomeKind::UsageError),
];

/// Classify one apk invocation. apk exits with its error count, so any
/// nonzero code is refined by stderr.
pub fn classify(operation: OperationKind, raw: &ExecutionResult) -> OperationOutcome {
    if raw.exit_code == 0 {
        return OperationOutcome::ok(raw);
    }
    match operation {
        OperationKind::Clean if raw.stderr_text().contains("Package cache is not enabled") => {
            OperationOutcome::ok(raw)
        }
        _ => classify_failure(raw, RULES),
    }
}
