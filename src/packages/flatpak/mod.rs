//! # Flatpak
//!
//! Desktop applications from a configured remote (`flathub` unless told
//! otherwise). Only applications are listed; runtimes are dependencies the
//! user did not ask for.

mod classify;
pub mod parse;

pub use classify::classify;

use crate::core::types::{
    ManagerCategory, OperationKind, Options, PackageRecord, PackageStatus,
};
use crate::error::{Result, SysPkgError};
use crate::exec::CommandRunner;
use crate::packages::PackageManager;
use crate::packages::runtime::{
    ManagerRuntime, base_name, dry_run_install, dry_run_remove, dry_run_upgrade, nothing_found,
    read_only,
};
use crate::utils::sanitize::{
    validate_optional_names, validate_package_name, validate_package_names,
};
use std::sync::Arc;

pub const MANAGER: &str = "flatpak";

pub const DEFAULT_REMOTE: &str = "flathub";

const FLATPAK: &str = "flatpak";

pub struct FlatpakManager {
    runtime: ManagerRuntime,
    remote: String,
}

impl FlatpakManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runtime: ManagerRuntime::new(MANAGER, runner, classify),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }

    /// Install from `remote` instead of flathub.
    pub fn with_remote(mut self, remote: &str) -> Self {
        self.remote = remote.to_string();
        self
    }

    /// Installed refs; runtimes too unless `apps_only`.
    fn installed_refs(&self, apps_only: bool, opts: &Options) -> Result<Vec<PackageRecord>> {
        let mut args = vec!["list".to_string()];
        if apps_only {
            args.push("--app".to_string());
        }
        args.push("--columns=application,version,branch,arch,origin,active".to_string());
        let raw = self
            .runtime
            .query(OperationKind::ListInstalled, FLATPAK, args, opts)?;
        Ok(parse::parse_list(&raw.stdout_text()))
    }

    fn args(base: &[&str], names: &[String], opts: &Options) -> Vec<String> {
        let mut args: Vec<String> = base.iter().map(|a| a.to_string()).collect();
        if opts.assume_yes {
            args.push("-y".to_string());
            args.push("--noninteractive".to_string());
        }
        args.extend(names.iter().cloned());
        args
    }
}

impl PackageManager for FlatpakManager {
    fn name(&self) -> &'static str {
        MANAGER
    }

    fn binary(&self) -> &'static str {
        FLATPAK
    }

    fn category(&self) -> ManagerCategory {
        ManagerCategory::App
    }

    fn is_available(&self) -> bool {
        self.runtime.probe(FLATPAK, "--version")
    }

    fn search(&self, keywords: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(keywords)?;
        let mut args = vec![
            "search".to_string(),
            "--columns=name,application,version,branch,remotes".to_string(),
        ];
        args.extend(keywords.iter().cloned());
        let raw = self.runtime.query(OperationKind::Search, FLATPAK, args, opts)?;
        let found = parse::parse_search(&raw.stdout_text());
        if found.is_empty() {
            return Ok(found);
        }

        let installed = self.list_installed(opts)?;
        Ok(found
            .into_iter()
            .map(|record| match installed.iter().find(|i| i.name == record.name) {
                Some(local) => {
                    let mut merged = if local.installed_version.is_empty() {
                        let mut found = local.clone();
                        found.available_version = record.available_version.clone();
                        found
                    } else {
                        PackageRecord::upgradable(
                            &record.name,
                            &local.installed_version,
                            &record.available_version,
                            MANAGER,
                        )
                    }
                    .with_arch(&local.arch)
                    .with_category(&local.category);
                    merged.extra = record.extra;
                    merged
                }
                None => record,
            })
            .collect())
    }

    fn list_installed(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        self.installed_refs(true, opts)
    }

    /// Every app `remote-ls --updates` reports that is installed locally is
    /// `upgradable`. When the version strings cannot tell the two apart
    /// (flatpak often leaves the local version empty) the active and remote
    /// commits stand in for them.
    fn list_upgradable(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let args = vec![
            "remote-ls".to_string(),
            "--updates".to_string(),
            "--app".to_string(),
            "--columns=application,version,branch,origin,commit".to_string(),
        ];
        let raw = self
            .runtime
            .query(OperationKind::ListUpgradable, FLATPAK, args, opts)?;
        let updates = parse::parse_updates(&raw.stdout_text());
        if updates.is_empty() {
            return Ok(updates);
        }

        let installed = self.list_installed(opts)?;
        Ok(updates
            .into_iter()
            .map(|update| match installed.iter().find(|i| i.name == update.name) {
                Some(local) => pending_update(update, local),
                None => update,
            })
            .collect())
    }

    /// Install from the configured remote, then report through `flatpak list`.
    fn install(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        if opts.dry_run {
            return dry_run_install(self, names, opts);
        }
        let args = Self::args(&["install", &self.remote], names, opts);
        self.runtime.mutate(OperationKind::Install, FLATPAK, args, opts)?;
        self.status(names, &read_only(opts))
    }

    fn remove(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        if opts.dry_run {
            return dry_run_remove(self, names, opts);
        }
        let args = Self::args(&["uninstall"], names, opts);
        self.runtime.mutate(OperationKind::Remove, FLATPAK, args, opts)?;

        let still_installed = self.status(names, &read_only(opts))?;
        let removed: Vec<PackageRecord> = still_installed
            .iter()
            .filter(|r| r.status == PackageStatus::Unknown)
            .map(|r| PackageRecord::available(&r.name, "", MANAGER))
            .collect();
        let kept = still_installed
            .into_iter()
            .filter(|r| r.status != PackageStatus::Unknown);
        Ok(removed.into_iter().chain(kept).collect())
    }

    fn refresh(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        let args = Self::args(&["update", "--appstream"], &[], opts);
        self.runtime.mutate(OperationKind::Refresh, FLATPAK, args, opts)?;
        Ok(Vec::new())
    }

    fn upgrade(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_optional_names(names)?;
        if opts.dry_run {
            return dry_run_upgrade(self, names, opts);
        }
        let args = Self::args(&["update"], names, opts);
        self.runtime.mutate(OperationKind::Upgrade, FLATPAK, args, opts)?;
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.status(names, &read_only(opts))
    }

    fn autoremove(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        let args = Self::args(&["uninstall", "--unused"], &[], opts);
        self.runtime.mutate(OperationKind::Autoremove, FLATPAK, args, opts)?;
        Ok(Vec::new())
    }

    /// Local `flatpak info`, falling back to `remote-info` on the configured
    /// remote for applications that are not installed.
    fn get_info(&self, name: &str, opts: &Options) -> Result<PackageRecord> {
        validate_package_name(name)?;
        let id = base_name(name).to_string();
        let local = self.runtime.query(
            OperationKind::GetInfo,
            FLATPAK,
            vec!["info".to_string(), id.clone()],
            opts,
        );
        let (raw, installed) = match local {
            Ok(raw) => (raw, true),
            Err(SysPkgError::Operation { .. }) => {
                let args = vec!["remote-info".to_string(), self.remote.clone(), id.clone()];
                (self.runtime.query(OperationKind::GetInfo, FLATPAK, args, opts)?, false)
            }
            Err(other) => return Err(other),
        };
        match parse::parse_info(&raw.stdout_text(), installed) {
            Some(record) => Ok(record),
            None => Err(nothing_found(MANAGER, OperationKind::GetInfo, name, raw)),
        }
    }

    /// Requested names resolve against every installed ref, runtimes
    /// included: exact ID first, then a case-insensitive ID or last ID
    /// component (`firefox` finds `org.mozilla.firefox`).
    fn status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let installed = self.installed_refs(false, opts)?;
        Ok(names
            .iter()
            .map(|name| {
                let base = base_name(name);
                match resolve_installed(&installed, base) {
                    Some(found) if found.name == base => found.clone(),
                    Some(found) => found.clone().with_extra("requested", base),
                    None => PackageRecord::unknown(base, MANAGER),
                }
            })
            .collect())
    }
}

/// Installed ref a user-supplied name refers to.
fn resolve_installed<'a>(installed: &'a [PackageRecord], name: &str) -> Option<&'a PackageRecord> {
    installed.iter().find(|r| r.name == name).or_else(|| {
        installed.iter().find(|r| {
            r.name.eq_ignore_ascii_case(name)
                || r.name
                    .rsplit('.')
                    .next()
                    .is_some_and(|last| last.eq_ignore_ascii_case(name))
        })
    })
}

/// Installed app with a pending update, keeping both version fields distinct.
fn pending_update(update: PackageRecord, local: &PackageRecord) -> PackageRecord {
    let versions_differ = !local.installed_version.is_empty()
        && !update.available_version.is_empty()
        && local.installed_version != update.available_version;

    let mut record = if versions_differ {
        PackageRecord::upgradable(
            &update.name,
            &local.installed_version,
            &update.available_version,
            MANAGER,
        )
    } else {
        let active = local.extra.get("commit").map(String::as_str).unwrap_or_default();
        let remote = update.extra.get("commit").map(String::as_str).unwrap_or_default();
        let mut by_commit = PackageRecord::upgradable(&update.name, active, remote, MANAGER);
        by_commit
            .extra
            .insert("update_kind".to_string(), "commit".to_string());
        let version = [&update.available_version, &local.installed_version]
            .into_iter()
            .find(|v| !v.is_empty());
        if let Some(version) = version {
            by_commit.extra.insert("version".to_string(), version.clone());
        }
        by_commit
    };
    // remote-ls --updates is authoritative about a pending update.
    record.status = PackageStatus::Upgradable;
    record.arch = local.arch.clone();
    record.category = update.category.clone();
    for (key, value) in update.extra {
        record.extra.entry(key).or_insert(value);
    }
    record
}
