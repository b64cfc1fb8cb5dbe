//! # YUM / DNF (Fedora, RHEL, CentOS, Rocky, Alma)
//!
//! Repository queries and transactions go through `yum` (a dnf alias on
//! modern systems); local state through `rpm`. yum has no simulate flag
//! that prints a parseable plan, so dry runs are read-only lookups.

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
    ManagerRuntime, base_name, complete_install, dry_run_install, dry_run_remove,
    dry_run_upgrade, nothing_found, read_only,
};
use crate::utils::sanitize::{
    validate_optional_names, validate_package_name, validate_package_names,
};
use std::sync::Arc;

pub const MANAGER: &str = "yum";

const YUM: &str = "yum";
const RPM: &str = "rpm";

const QUERY_FORMAT: &str = "%{NAME} %|EPOCH?{%{EPOCH}:}|%{VERSION}-%{RELEASE} %{ARCH}\n";

pub struct YumManager {
    runtime: ManagerRuntime,
}

impl YumManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runtime: ManagerRuntime::new(MANAGER, runner, classify),
        }
    }

    /// rpm's view of `names`.
    fn rpm_status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        let mut args = vec!["-q".to_string(), "--qf".to_string(), QUERY_FORMAT.to_string()];
        args.extend(names.iter().cloned());
        let raw = self.runtime.query(OperationKind::Status, RPM, args, opts)?;
        Ok(parse::parse_rpm_query(&raw.stdout_text()))
    }

    fn yum_args(subcommand: &str, names: &[String], opts: &Options) -> Vec<String> {
        let mut args = vec![subcommand.to_string()];
        if opts.assume_yes {
            args.push("-y".to_string());
        }
        args.extend(names.iter().cloned());
        args
    }

    fn transaction(
        &self,
        operation: OperationKind,
        subcommand: &str,
        names: &[String],
        opts: &Options,
    ) -> Result<Vec<PackageRecord>> {
        let args = Self::yum_args(subcommand, names, opts);
        match self.runtime.mutate(operation, YUM, args, opts)? {
            Some(raw) => {
                let records = parse::parse_transaction(&raw.stdout_text());
                complete_install(self, names, records, opts)
            }
            None if names.is_empty() => Ok(Vec::new()),
            None => self.status(names, &read_only(opts)),
        }
    }
}

impl PackageManager for YumManager {
    fn name(&self) -> &'static str {
        MANAGER
    }

    fn binary(&self) -> &'static str {
        YUM
    }

    fn category(&self) -> ManagerCategory {
        ManagerCategory::System
    }

    fn is_available(&self) -> bool {
        self.runtime.probe(YUM, "--version")
    }

    fn search(&self, keywords: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(keywords)?;
        let mut args = vec!["search".to_string(), "-q".to_string()];
        args.extend(keywords.iter().cloned());
        let raw = self.runtime.query(OperationKind::Search, YUM, args, opts)?;
        let mut records = parse::parse_search(&raw.stdout_text());
        if records.is_empty() {
            return Ok(records);
        }

        let names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
        let local = self.rpm_status(&names, opts)?;
        for record in records.iter_mut() {
            if let Some(found) = local
                .iter()
                .find(|l| l.name == record.name && l.status == PackageStatus::Installed)
            {
                record.status = PackageStatus::Installed;
                record.installed_version = found.installed_version.clone();
            }
        }
        Ok(records)
    }

    fn list_installed(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let args = vec!["-qa".to_string(), "--qf".to_string(), QUERY_FORMAT.to_string()];
        let raw = self
            .runtime
            .query(OperationKind::ListInstalled, RPM, args, opts)?;
        Ok(parse::parse_rpm_query(&raw.stdout_text()))
    }

    /// `check-update` candidates joined with rpm's installed versions.
    fn list_upgradable(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let args = vec!["check-update".to_string(), "-q".to_string()];
        let raw = self
            .runtime
            .query(OperationKind::ListUpgradable, YUM, args, opts)?;
        let candidates = parse::parse_check_update(&raw.stdout_text());
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let names: Vec<String> = candidates.iter().map(|r| r.name.clone()).collect();
        let local = self.rpm_status(&names, opts)?;
        Ok(candidates
            .into_iter()
            .map(|candidate| {
                let installed = local
                    .iter()
                    .find(|l| l.name == candidate.name)
                    .map(|l| l.installed_version.as_str())
                    .unwrap_or_default();
                PackageRecord::upgradable(
                    &candidate.name,
                    installed,
                    &candidate.available_version,
                    MANAGER,
                )
                .with_arch(&candidate.arch)
                .with_category(&candidate.category)
            })
            .collect())
    }

    fn install(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        if opts.dry_run {
            return dry_run_install(self, names, opts);
        }
        self.transaction(OperationKind::Install, "install", names, opts)
    }

    fn remove(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        if opts.dry_run {
            return dry_run_remove(self, names, opts);
        }
        self.transaction(OperationKind::Remove, "remove", names, opts)
    }

    fn refresh(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        self.runtime
            .mutate(OperationKind::Refresh, YUM, vec!["makecache".to_string()], opts)?;
        Ok(Vec::new())
    }

    fn upgrade(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_optional_names(names)?;
        if opts.dry_run {
            return dry_run_upgrade(self, names, opts);
        }
        self.transaction(OperationKind::Upgrade, "upgrade", names, opts)
    }

    fn clean(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        let args = vec!["clean".to_string(), "all".to_string()];
        self.runtime.mutate(OperationKind::Clean, YUM, args, opts)?;
        Ok(Vec::new())
    }

    fn autoremove(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        self.transaction(OperationKind::Autoremove, "autoremove", &[], opts)
    }

    /// `rpm -V` per installed name; findings land in `extra`.
    fn verify(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let bases: Vec<String> = names.iter().map(|n| base_name(n).to_string()).collect();
        let records = fill_unknown(self.rpm_status(&bases, opts)?, &bases, MANAGER);

        records
            .into_iter()
            .map(|record| {
                if record.status != PackageStatus::Installed {
                    return Ok(record);
                }
                let args = vec!["-V".to_string(), record.name.clone()];
                let raw = self.runtime.query(OperationKind::Verify, RPM, args, opts)?;
                let findings = parse::parse_verify(&raw.stdout_text());
                Ok(if findings.is_empty() {
                    record.with_extra("verify", "ok")
                } else {
                    let files: Vec<&str> = findings.iter().map(|(_, path)| path.as_str()).collect();
                    record
                        .with_extra("verify", "modified")
                        .with_extra("modified_files", files.join(","))
                })
            })
            .collect()
    }

    fn get_info(&self, name: &str, opts: &Options) -> Result<PackageRecord> {
        validate_package_name(name)?;
        let args = vec!["info".to_string(), "-q".to_string(), name.to_string()];
        let raw = self.runtime.query(OperationKind::GetInfo, YUM, args, opts)?;
        match parse::parse_info(&raw.stdout_text(), base_name(name)) {
            Some(record) => Ok(record),
            None => Err(nothing_found(MANAGER, OperationKind::GetInfo, name, raw)),
        }
    }

    fn status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let bases: Vec<String> = names.iter().map(|n| base_name(n).to_string()).collect();
        let records = self.rpm_status(&bases, opts)?;
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

    fn rpm_q(names: &str) -> String {
        format!("rpm -q --qf {QUERY_FORMAT} {names}")
    }

    #[test]
    fn list_upgradable_accepts_exit_100() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "yum check-update -q",
            ExecutionResult::new(
                100,
                "\nkernel.x86_64    5.14.0-362.18.1.el9_3    baseos\n",
                "",
            ),
        );
        mock.respond(
            &rpm_q("kernel"),
            ExecutionResult::new(0, "kernel 5.14.0-362.13.1.el9_3 x86_64\n", ""),
        );

        let records = YumManager::new(mock.clone())
            .list_upgradable(&Options::default())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, PackageStatus::Upgradable);
        assert_eq!(records[0].installed_version, "5.14.0-362.13.1.el9_3");
    }

    #[test]
    fn install_exit_100_is_general_error() {
        let mock = Arc::new(MockRunner::new());
        mock.respond("yum install -y vim", ExecutionResult::new(100, "", ""));
        let err = YumManager::new(mock.clone())
            .install(&names(&["vim"]), &Options::assume_yes())
            .unwrap_err();
        assert_eq!(err.kind(), OutcomeKind::GeneralError);
    }

    #[test]
    fn status_marks_missing_names_unknown() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            &rpm_q("bash nano"),
            ExecutionResult::new(1, "bash 5.1.8-6.el9_1 x86_64\npackage nano is not installed\n", ""),
        );
        let records = YumManager::new(mock.clone())
            .status(&names(&["bash", "nano"]), &Options::default())
            .unwrap();
        assert_eq!(records[0].status, PackageStatus::Installed);
        assert_eq!(records[1].status, PackageStatus::Unknown);
    }

    #[test]
    fn dry_run_install_never_runs_a_transaction() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "yum info -q cowsay",
            ExecutionResult::new(
                0,
                "Available Packages\nName         : cowsay\nVersion      : 3.7.0\nRelease      : 11.el9\nArchitecture : noarch\nRepository   : epel\n",
                "",
            ),
        );
        let records = YumManager::new(mock.clone())
            .install(&names(&["cowsay"]), &Options::dry_run())
            .unwrap();
        assert_eq!(records[0].planned_action(), Some("would-install"));
        assert!(mock.calls().iter().all(|c| !c.starts_with("yum install")));
    }
}
