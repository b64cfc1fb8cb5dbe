//! # APK (Alpine Linux)
//!
//! apk never prompts and removes orphaned dependencies on its own, so there
//! is no assume-yes flag and autoremove keeps the empty default. Dry runs
//! use `--simulate`, which prints the same change lines as a real run.

mod classify;
pub mod parse;

pub use classify::classify;

use crate::core::types::{
    ManagerCategory, OperationKind, Options, PackageRecord, PackageStatus, fill_unknown,
};
use crate::error::Result;
use crate::exec::CommandRunner;
use crate::packages::PackageManager;
use crate::packages::runtime::{
    ManagerRuntime, base_name, complete_install, nothing_found, read_only,
};
use crate::utils::sanitize::{
    validate_optional_names, validate_package_name, validate_package_names,
};
use std::sync::Arc;

pub const MANAGER: &str = "apk";

const APK: &str = "apk";

pub struct ApkManager {
    runtime: ManagerRuntime,
}

impl ApkManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runtime: ManagerRuntime::new(MANAGER, runner, classify),
        }
    }

    /// `apk list <names>` narrowed to exact name matches; apk treats the
    /// arguments as patterns.
    fn list_exact(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        let mut args = vec!["list".to_string()];
        args.extend(names.iter().cloned());
        let raw = self.runtime.query(OperationKind::Status, APK, args, opts)?;
        Ok(parse::parse_list(&raw.stdout_text())
            .into_iter()
            .filter(|r| names.contains(&r.name))
            .collect())
    }

    /// add/del/upgrade: `--simulate` under dry-run, change lines either way.
    fn change(
        &self,
        operation: OperationKind,
        subcommand: &str,
        names: &[String],
        opts: &Options,
    ) -> Result<Vec<PackageRecord>> {
        let mut args = vec![subcommand.to_string()];
        if opts.dry_run {
            args.push("--simulate".to_string());
        }
        args.extend(names.iter().cloned());

        if opts.dry_run {
            let raw = self.runtime.query(operation, APK, args, opts)?;
            return Ok(parse::parse_changes(&raw.stdout_text(), true));
        }
        match self.runtime.mutate(operation, APK, args, opts)? {
            Some(raw) => {
                let records = parse::parse_changes(&raw.stdout_text(), false);
                complete_install(self, names, records, opts)
            }
            None if names.is_empty() => Ok(Vec::new()),
            None => self.status(names, &read_only(opts)),
        }
    }
}

impl PackageManager for ApkManager {
    fn name(&self) -> &'static str {
        MANAGER
    }

    fn binary(&self) -> &'static str {
        APK
    }

    fn category(&self) -> ManagerCategory {
        ManagerCategory::System
    }

    fn is_available(&self) -> bool {
        self.runtime.probe(APK, "--version")
    }

    /// `apk search -v`, with installed state from `apk list --installed`.
    fn search(&self, keywords: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(keywords)?;
        let mut args = vec!["search".to_string(), "-v".to_string()];
        args.extend(keywords.iter().cloned());
        let raw = self.runtime.query(OperationKind::Search, APK, args, opts)?;
        let found = parse::parse_search(&raw.stdout_text());
        if found.is_empty() {
            return Ok(found);
        }

        let installed = self.list_installed(opts)?;
        Ok(found
            .into_iter()
            .map(|record| match installed.iter().find(|i| i.name == record.name) {
                Some(local) => {
                    let mut merged = PackageRecord::upgradable(
                        &record.name,
                        &local.installed_version,
                        &record.available_version,
                        MANAGER,
                    )
                    .with_arch(&local.arch);
                    merged.extra = record.extra;
                    merged
                }
                None => record,
            })
            .collect())
    }

    fn list_installed(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let args = vec!["list".to_string(), "--installed".to_string()];
        let raw = self
            .runtime
            .query(OperationKind::ListInstalled, APK, args, opts)?;
        Ok(parse::parse_list(&raw.stdout_text()))
    }

    fn list_upgradable(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let args = vec!["list".to_string(), "--upgradable".to_string()];
        let raw = self
            .runtime
            .query(OperationKind::ListUpgradable, APK, args, opts)?;
        Ok(parse::parse_list(&raw.stdout_text())
            .into_iter()
            .filter(|r| r.status == PackageStatus::Upgradable)
            .collect())
    }

    fn install(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        self.change(OperationKind::Install, "add", names, opts)
    }

    fn remove(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        self.change(OperationKind::Remove, "del", names, opts)
    }

    fn refresh(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        self.runtime
            .mutate(OperationKind::Refresh, APK, vec!["update".to_string()], opts)?;
        Ok(Vec::new())
    }

    fn upgrade(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_optional_names(names)?;
        self.change(OperationKind::Upgrade, "upgrade", names, opts)
    }

    fn clean(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        let args = vec!["cache".to_string(), "clean".to_string()];
        self.runtime.mutate(OperationKind::Clean, APK, args, opts)?;
        Ok(Vec::new())
    }

    /// One `apk audit --packages` run; named packages it lists are modified.
    fn verify(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let records = self.status(names, opts)?;
        let args = vec!["audit".to_string(), "--packages".to_string()];
        let raw = self.runtime.query(OperationKind::Verify, APK, args, opts)?;
        let modified = parse::parse_audit_packages(&raw.stdout_text());

        Ok(records
            .into_iter()
            .map(|record| match record.status {
                PackageStatus::Installed | PackageStatus::Upgradable => {
                    let verdict = if modified.contains(&record.name) { "modified" } else { "ok" };
                    record.with_extra("verify", verdict)
                }
                _ => record,
            })
            .collect())
    }

    fn get_info(&self, name: &str, opts: &Options) -> Result<PackageRecord> {
        validate_package_name(name)?;
        let wanted = vec![base_name(name).to_string()];
        let mut args = vec!["list".to_string()];
        args.extend(wanted.iter().cloned());
        let raw = self.runtime.query(OperationKind::GetInfo, APK, args, opts)?;
        let found = parse::parse_list(&raw.stdout_text())
            .into_iter()
            .find(|r| wanted.contains(&r.name));
        match found {
            Some(record) => Ok(record),
            None => Err(nothing_found(MANAGER, OperationKind::GetInfo, name, raw)),
        }
    }

    fn status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let bases: Vec<String> = names.iter().map(|n| base_name(n).to_string()).collect();
        let records = self.list_exact(&bases, opts)?;
        Ok(fill_unknown(records, &bases, MANAGER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::OutcomeKind;
    use crate::exec::ExecutionResult;
    use crate::testing::MockRunner;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn status_filters_pattern_matches() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "apk list vim nope",
            ExecutionResult::new(
                0,
                "vim-9.0.2127-r0 x86_64 {vim} (Vim) [installed]\nvim-doc-9.0.2127-r0 noarch {vim} (Vim)\n",
                "",
            ),
        );
        let records = ApkManager::new(mock.clone())
            .status(&names(&["vim", "nope"]), &Options::default())
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "vim");
        assert_eq!(records[1].status, PackageStatus::Unknown);
    }

    #[test]
    fn simulated_add_is_planned() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "apk add --simulate vim",
            ExecutionResult::new(
                0,
                "(1/2) Installing xxd (9.0.2127-r0)\n(2/2) Installing vim (9.0.2127-r0)\nOK: 30 MiB in 26 packages\n",
                "",
            ),
        );
        let records = ApkManager::new(mock.clone())
            .install(&names(&["vim"]), &Options::dry_run())
            .unwrap();
        assert!(records.iter().all(|r| r.planned_action() == Some("would-install")));
    }

    #[test]
    fn missing_package_is_not_found() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "apk add nope",
            ExecutionResult::new(
                1,
                "",
                "ERROR: unable to select packages:\n  nope (no such package):\n    required by: world[nope]\n",
            ),
        );
        let err = ApkManager::new(mock.clone())
            .install(&names(&["nope"]), &Options::default())
            .unwrap_err();
        assert_eq!(err.kind(), OutcomeKind::NotFound);
    }
}
