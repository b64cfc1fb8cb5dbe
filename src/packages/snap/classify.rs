use crate::core::outcome::{OperationOutcome, OutcomeKind, StderrRule, classify_failure};
use crate::core::types::OperationKind;
use crate::exec::ExecutionResult;

/// Messages that mean "nothing to report" rather than failure.
const EMPTY_RESULT: &[&str] = &["No matching snaps", "no snap found", "All snaps up to date"];

const RULES: &[StderrRule] = &[
    ("not found", OutcomeKind::NotFound),
    ("is not installed", OutcomeKind::NotFound),
    ("no matching snaps installed", OutcomeKind::NotFound),
    ("access denied", OutcomeKind::PermissionDenied),
    ("Permission denied", OutcomeKind::PermissionDenied),
    ("unknown command", OutcomeKind::UsageError),
    ("unknown flag", OutcomeKind::UsageError),
    ("the required argument", OutcomeKind::UsageError),
];

/// Classify one snap invocation. snap exits 1 for every failure, so the
/// kind comes from stderr alone.
pub fn classify(operation: OperationKind, raw: &ExecutionResult) -> OperationOutcome {
    if raw.exit_code == 0 {
        return OperationOutcome::ok(raw);
    }
    let stderr = raw.stderr_text();
    let empty_result = EMPTY_RESULT.iter().any(|m| stderr.contains(m));
    match operation {
        OperationKind::Search | OperationKind::ListUpgradable | OperationKind::ListInstalled
            if empty_result =>
        {
            OperationOutcome::ok(raw)
        }
        _ => classify_failure(raw, RULES),
    }
}
