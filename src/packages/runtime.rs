//! Shared plumbing for manager adapters: run, classify, hand back output.

use crate::core::outcome::{OperationOutcome, OutcomeKind};
use crate::core::types::{Operation, OperationKind, Options, PackageRecord, PlannedAction};
use crate::error::{Result, SysPkgError};
use crate::exec::{CommandRequest, CommandRunner, ExecutionResult, RunControl};
use crate::packages::PackageManager;
use crate::parsers::split_name_arch;
use crate::ui;
use std::sync::Arc;
use std::time::Duration;

/// Pure mapping of a finished invocation onto an outcome kind.
pub type Classifier = fn(OperationKind, &ExecutionResult) -> OperationOutcome;

/// Deadline for the availability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runner, classifier and environment shared by one adapter's methods.
#[derive(Clone)]
pub struct ManagerRuntime {
    manager: &'static str,
    runner: Arc<dyn CommandRunner>,
    classify: Classifier,
    env: Vec<(String, String)>,
}

impl ManagerRuntime {
    pub fn new(manager: &'static str, runner: Arc<dyn CommandRunner>, classify: Classifier) -> Self {
        Self {
            manager,
            runner,
            classify,
            env: Vec::new(),
        }
    }

    /// Environment variable applied to every command of this manager.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn manager(&self) -> &'static str {
        self.manager
    }

    fn request(&self, program: &str, args: Vec<String>) -> CommandRequest {
        let mut request = CommandRequest::new(program).args(args);
        request.env.extend(self.env.iter().cloned());
        request
    }

    fn finish(&self, operation: OperationKind, result: ExecutionResult) -> Result<ExecutionResult> {
        if let Some(error) = result.invocation_error.clone() {
            return Err(error.into());
        }
        let outcome = (self.classify)(operation, &result);
        if !outcome.is_ok() {
            ui::debug(&format!(
                "{} {}: classified {} ({})",
                self.manager, operation, outcome.kind, outcome.detail
            ));
        }
        outcome.into_result(self.manager, operation)
    }

    /// Run with captured output and classify. `Ok` carries the raw result
    /// for parsing.
    pub fn query(
        &self,
        operation: OperationKind,
        program: &str,
        args: Vec<String>,
        opts: &Options,
    ) -> Result<ExecutionResult> {
        let request = self.request(program, args);
        let result = self.runner.run(&request, &opts.control);
        self.finish(operation, result)
    }

    /// Run a state-changing command.
    ///
    /// In interactive mode the terminal goes to the tool, only the exit code
    /// is classified, and `None` is returned: there is nothing to parse.
    pub fn mutate(
        &self,
        operation: OperationKind,
        program: &str,
        args: Vec<String>,
        opts: &Options,
    ) -> Result<Option<ExecutionResult>> {
        if opts.interactive && !opts.dry_run {
            let request = self.request(program, args);
            let code = self.runner.run_interactive(&request, &opts.control)?;
            self.finish(operation, ExecutionResult::from_exit_code(code))?;
            return Ok(None);
        }
        self.query(operation, program, args, opts).map(Some)
    }

    /// Binary present on PATH and minimally invokable.
    pub fn probe(&self, binary: &str, version_arg: &str) -> bool {
        if self.runner.locate(binary).is_none() {
            return false;
        }
        let request = self.request(binary, vec![version_arg.to_string()]);
        let result = self.runner.run(&request, &RunControl::with_timeout(PROBE_TIMEOUT));
        result.invocation_error.is_none() && result.exit_code == 0
    }
}

/// A command that exited cleanly but described nothing for the requested
/// name (`apt-cache show` on a virtual package, an empty `snap info`).
pub fn nothing_found(
    manager: &str,
    operation: OperationKind,
    name: &str,
    raw: ExecutionResult,
) -> SysPkgError {
    SysPkgError::Operation {
        manager: manager.to_string(),
        operation,
        kind: OutcomeKind::NotFound,
        detail: format!("no package matching '{name}'"),
        raw: Box::new(raw),
    }
}

/// Strip version pins and architecture qualifiers: `vim=2:8.2`, `libc6:amd64`.
pub fn base_name(requested: &str) -> &str {
    let unpinned = requested.split('=').next().unwrap_or(requested);
    split_name_arch(unpinned).0
}

/// Names from `requested` that no record mentions.
pub fn missing_from(requested: &[String], records: &[PackageRecord]) -> Vec<String> {
    requested
        .iter()
        .map(|r| base_name(r))
        .filter(|name| !records.iter().any(|rec| rec.name == *name))
        .map(str::to_string)
        .collect()
}

/// After a successful install, report requested packages the tool did not
/// mention (typically "already installed") through a status query.
pub fn complete_install(
    manager: &dyn PackageManager,
    requested: &[String],
    mut records: Vec<PackageRecord>,
    opts: &Options,
) -> Result<Vec<PackageRecord>> {
    let missing = missing_from(requested, &records);
    if !missing.is_empty() {
        records.extend(manager.status(&missing, &read_only(opts))?);
    }
    Ok(records)
}

/// Same options, stripped of everything that would change the system or
/// take over the terminal.
pub fn read_only(opts: &Options) -> Options {
    Options {
        dry_run: false,
        interactive: false,
        ..opts.clone()
    }
}

/// Dry-run install for tools without a simulate flag: a read-only lookup
/// of each name, tagged `would-install`.
pub fn dry_run_install(
    manager: &dyn PackageManager,
    names: &[String],
    opts: &Options,
) -> Result<Vec<PackageRecord>> {
    let opts = read_only(opts);
    names
        .iter()
        .map(|name| {
            manager
                .get_info(base_name(name), &opts)
                .map(|record| record.planned(PlannedAction::WouldInstall))
        })
        .collect()
}

/// Dry-run removal: current status of each name, tagged `would-remove`.
pub fn dry_run_remove(
    manager: &dyn PackageManager,
    names: &[String],
    opts: &Options,
) -> Result<Vec<PackageRecord>> {
    let records = manager.status(names, &read_only(opts))?;
    Ok(records
        .into_iter()
        .map(|record| record.planned(PlannedAction::WouldRemove))
        .collect())
}

/// Dry-run upgrade: the upgradable listing, narrowed to `names` when given,
/// tagged `would-upgrade`.
pub fn dry_run_upgrade(
    manager: &dyn PackageManager,
    names: &[String],
    opts: &Options,
) -> Result<Vec<PackageRecord>> {
    let wanted: Vec<&str> = names.iter().map(|n| base_name(n)).collect();
    let records = manager.list_upgradable(&read_only(opts))?;
    Ok(records
        .into_iter()
        .filter(|r| wanted.is_empty() || wanted.contains(&r.name.as_str()))
        .map(|record| record.planned(PlannedAction::WouldUpgrade))
        .collect())
}

/// Operation name for log lines.
pub fn describe(operation: &Operation) -> String {
    match operation {
        Operation::Search(names)
        | Operation::Install(names)
        | Operation::Remove(names)
        | Operation::Upgrade(names)
        | Operation::Verify(names)
        | Operation::Status(names)
            if !names.is_empty() =>
        {
            format!("{} {}", operation.kind(), names.join(" "))
        }
        Operation::GetInfo(name) => format!("{} {}", operation.kind(), name),
        _ => operation.kind().to_string(),
    }
}
