use crate::core::outcome::{OperationOutcome, OutcomeKind, StderrRule, classify_failure};
use crate::core::types::OperationKind;
use crate::exec::ExecutionResult;

/// apt, apt-cache, dpkg and dpkg-query messages, most specific first.
const RULES: &[StderrRule] = &[
    ("Unable to locate package", OutcomeKind::NotFound),
    ("No packages found", OutcomeKind::NotFound),
    ("has no installation candidate", OutcomeKind::NotFound),
    ("is not installed", OutcomeKind::NotFound),
    ("Permission denied", OutcomeKind::PermissionDenied),
    ("are you root", OutcomeKind::PermissionDenied),
    ("Could not open lock file", OutcomeKind::PermissionDenied),
    ("Unable to acquire the dpkg frontend lock", OutcomeKind::PermissionDenied),
    ("Invalid operation", OutcomeKind::UsageError),
    ("Command line option", OutcomeKind::UsageError),
];

/// Classify one apt-family invocation.
///
/// apt exits 100 for every kind of failure, so the exit code alone never
/// decides anything beyond success; stderr picks the kind and unmatched
/// failures stay `GeneralError`.
pub fn classify(operation: OperationKind, raw: &ExecutionResult) -> OperationOutcome {
    if raw.exit_code == 0 {
        return OperationOutcome::ok(raw);
    }

    let stderr = raw.stderr_text();
    match operation {
        // dpkg-query exits 1 when some of the queried names are unknown;
        // those names are reported as Unknown records, not as a failure.
        OperationKind::Status | OperationKind::ListInstalled
            if raw.exit_code == 1 && only_unknown_names(&stderr) =>
        {
            OperationOutcome::ok(raw)
        }
        // dpkg --verify exits 1 when it found modified files
        OperationKind::Verify if raw.exit_code == 1 && stderr.trim().is_empty() => {
            OperationOutcome::ok(raw)
        }
        _ => classify_failure(raw, RULES),
    }
}

fn only_unknown_names(stderr: &str) -> bool {
    let mut lines = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    lines.peek().is_some() && lines.all(|l| l.contains("no packages found matching"))
}
