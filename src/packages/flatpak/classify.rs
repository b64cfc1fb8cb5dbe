use crate::core::outcome::{OperationOutcome, OutcomeKind, StderrRule, classify_failure};
use crate::core::types::OperationKind;
use crate::exec::ExecutionResult;

const RULES: &[StderrRule] = &[
    ("No remote refs found", OutcomeKind::NotFound),
    ("Nothing matches", OutcomeKind::NotFound),
    ("not installed", OutcomeKind::NotFound),
    ("No such ref", OutcomeKind::NotFound),
    ("not found", OutcomeKind::NotFound),
    ("Permission denied", OutcomeKind::PermissionDenied),
    ("Not allowed", OutcomeKind::PermissionDenied),
    ("authorization", OutcomeKind::PermissionDenied),
    ("Unknown option", OutcomeKind::UsageError),
    ("Unknown command", OutcomeKind::UsageError),
];

/// Classify one flatpak invocation.
pub fn classify(operation: OperationKind, raw: &ExecutionResult) -> OperationOutcome {
    if raw.exit_code == 0 {
        return OperationOutcome::ok(raw);
    }
    match operation {
        OperationKind::Search if raw.stdout_text().contains("No matches found") => {
            OperationOutcome::ok(raw)
        }
        _ => classify_failure(raw, RULES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(op: OperationKind, stderr: &str) -> OutcomeKind {
        classify(op, &ExecutionResult::new(1, "", stderr)).kind
    }

    #[test]
    fn stderr_decides_kind() {
        assert_eq!(
            kind(
                OperationKind::Install,
                "error: No remote refs found similar to ‘org.nope.App’\n"
            ),
            OutcomeKind::NotFound
        );
        assert_eq!(
            kind(OperationKind::Remove, "error: org.nope.App/*unspecified*/* not installed\n"),
            OutcomeKind::NotFound
        );
        assert_eq!(
            kind(OperationKind::Install, "error: Failed to install: Not allowed for user\n"),
            OutcomeKind::PermissionDenied
        );
        assert_eq!(
            kind(OperationKind::Refresh, "error: Unable to load summary from remote flathub"),
            OutcomeKind::GeneralError
        );
    }

    #[test]
    fn empty_search_is_ok() {
        let raw = ExecutionResult::new(1, "No matches found\n", "");
        assert!(classify(OperationKind::Search, &raw).is_ok());
    }
}
