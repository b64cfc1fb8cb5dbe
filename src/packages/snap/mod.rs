//! # Snap
//!
//! Canonical's sandboxed application packages. Snap has no separate
//! metadata refresh, cache clean, orphan removal or file verification, so
//! those operations keep the empty default.

mod classify;
pub mod parse;

pub use classify::classify;

use crate::core::types::{ManagerCategory, OperationKind, Options, PackageRecord, fill_unknown};
use crate::error::Result;
use crate::exec::CommandRunner;
use crate::packages::PackageManager;
use crate::packages::runtime::{
    ManagerRuntime, base_name, complete_install, dry_run_install, dry_run_remove,
    dry_run_upgrade, nothing_found, read_only,
};
use crate::utils::sanitize::{
    validate_optional_names, validate_package_name, validate_package_names,
};
use std::sync::Arc;

pub const MANAGER: &str = "snap";

const SNAP: &str = "snap";

pub struct SnapManager {
    runtime: ManagerRuntime,
}

impl SnapManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runtime: ManagerRuntime::new(MANAGER, runner, classify),
        }
    }

    fn snap(&self, operation: OperationKind, args: &[&str], opts: &Options) -> Result<String> {
        let args = args.iter().map(|a| a.to_string()).collect();
        let raw = self.runtime.query(operation, SNAP, args, opts)?;
        Ok(raw.stdout_text())
    }
}

impl PackageManager for SnapManager {
    fn name(&self) -> &'static str {
        MANAGER
    }

    fn binary(&self) -> &'static str {
        SNAP
    }

    fn category(&self) -> ManagerCategory {
        ManagerCategory::App
    }

    fn is_available(&self) -> bool {
        self.runtime.probe(SNAP, "--version")
    }

    /// `snap find`, with installed snaps marked from `snap list`.
    fn search(&self, keywords: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(keywords)?;
        let mut args = vec!["find".to_string()];
        args.extend(keywords.iter().cloned());
        let raw = self.runtime.query(OperationKind::Search, SNAP, args, opts)?;
        let found = parse::parse_find(&raw.stdout_text());
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
                    );
                    merged.extra = record.extra;
                    merged.category = local.category.clone();
                    merged
                }
                None => record,
            })
            .collect())
    }

    fn list_installed(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let text = self.snap(OperationKind::ListInstalled, &["list"], opts)?;
        Ok(parse::parse_list(&text))
    }

    fn list_upgradable(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let text = self.snap(OperationKind::ListUpgradable, &["refresh", "--list"], opts)?;
        let candidates = parse::parse_refresh_list(&text);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let installed = self.list_installed(opts)?;
        Ok(candidates
            .into_iter()
            .map(|candidate| {
                let local = installed.iter().find(|i| i.name == candidate.name);
                let mut record = PackageRecord::upgradable(
                    &candidate.name,
                    local.map(|l| l.installed_version.as_str()).unwrap_or_default(),
                    &candidate.available_version,
                    MANAGER,
                );
                record.extra = candidate.extra;
                if let Some(local) = local {
                    record.category = local.category.clone();
                }
                record
            })
            .collect())
    }

    fn install(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        if opts.dry_run {
            return dry_run_install(self, names, opts);
        }
        let mut args = vec!["install".to_string()];
        args.extend(names.iter().cloned());
        match self.runtime.mutate(OperationKind::Install, SNAP, args, opts)? {
            Some(raw) => {
                let records = parse::parse_changes(&raw.stdout_text());
                complete_install(self, names, records, opts)
            }
            None => self.status(names, &read_only(opts)),
        }
    }

    fn remove(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        if opts.dry_run {
            return dry_run_remove(self, names, opts);
        }
        let mut args = vec!["remove".to_string()];
        args.extend(names.iter().cloned());
        match self.runtime.mutate(OperationKind::Remove, SNAP, args, opts)? {
            Some(raw) => {
                let records = parse::parse_removed(&raw.stdout_text());
                complete_install(self, names, records, opts)
            }
            None => self.status(names, &read_only(opts)),
        }
    }

    fn upgrade(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_optional_names(names)?;
        if opts.dry_run {
            return dry_run_upgrade(self, names, opts);
        }
        let mut args = vec!["refresh".to_string()];
        args.extend(names.iter().cloned());
        match self.runtime.mutate(OperationKind::Upgrade, SNAP, args, opts)? {
            Some(raw) => Ok(parse::parse_changes(&raw.stdout_text())),
            None => Ok(Vec::new()),
        }
    }

    fn get_info(&self, name: &str, opts: &Options) -> Result<PackageRecord> {
        validate_package_name(name)?;
        let args = vec!["info".to_string(), base_name(name).to_string()];
        let raw = self.runtime.query(OperationKind::GetInfo, SNAP, args, opts)?;
        match parse::parse_info(&raw.stdout_text()) {
            Some(record) => Ok(record),
            None => Err(nothing_found(MANAGER, OperationKind::GetInfo, name, raw)),
        }
    }

    /// Installed snaps from `snap list`; anything else is `Unknown`.
    fn status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let bases: Vec<String> = names.iter().map(|n| base_name(n).to_string()).collect();
        let installed: Vec<PackageRecord> = self
            .list_installed(opts)?
            .into_iter()
            .filter(|r| bases.contains(&r.name))
            .collect();
        Ok(fill_unknown(installed, &bases, MANAGER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PackageStatus;
    use crate::exec::ExecutionResult;
    use crate::testing::MockRunner;

    const LIST: &str = "Name     Version  Rev   Tracking       Publisher   Notes\ncore22   20231123 1033  latest/stable  canonical✓  base\nfirefox  121.0-1  3600  latest/stable  mozilla✓    -\n";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn status_filters_snap_list() {
        let mock = Arc::new(MockRunner::new());
        mock.respond("snap list", ExecutionResult::new(0, LIST, ""));
        let records = SnapManager::new(mock.clone())
            .status(&names(&["firefox", "vlc"]), &Options::default())
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, PackageStatus::Installed);
        assert_eq!(records[1].name, "vlc");
        assert_eq!(records[1].status, PackageStatus::Unknown);
    }

    #[test]
    fn list_upgradable_joins_installed_versions() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "snap refresh --list",
            ExecutionResult::new(
                0,
                "Name     Version  Rev   Size   Publisher  Notes\nfirefox  122.0-2  3728  275MB  mozilla✓   -\n",
                "",
            ),
        );
        mock.respond("snap list", ExecutionResult::new(0, LIST, ""));

        let records = SnapManager::new(mock.clone())
            .list_upgradable(&Options::default())
            .unwrap();
        assert_eq!(records[0].status, PackageStatus::Upgradable);
        assert_eq!(records[0].installed_version, "121.0-1");
        assert_eq!(records[0].available_version, "122.0-2");
    }

    #[test]
    fn nothing_to_refresh() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "snap refresh --list",
            ExecutionResult::new(0, "", "All snaps up to date.\n"),
        );
        let records = SnapManager::new(mock.clone())
            .list_upgradable(&Options::default())
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn install_missing_snap_is_not_found() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "snap install nonexistent-xyz",
            ExecutionResult::new(1, "", "error: snap \"nonexistent-xyz\" not found\n"),
        );
        let err = SnapManager::new(mock.clone())
            .install(&names(&["nonexistent-xyz"]), &Options::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::outcome::OutcomeKind::NotFound);
    }
}
