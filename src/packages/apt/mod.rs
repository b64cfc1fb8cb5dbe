//! # APT (Debian, Ubuntu)
//!
//! Queries go through `apt` for the repository view and `dpkg-query` for
//! the local view; mutations through `apt` with `DEBIAN_FRONTEND` pinned
//! to `noninteractive`. Dry runs use apt's own `-s` simulation.

mod classify;
pub mod parse;

pub use classify::classify;

use crate::core::types::{
    ManagerCategory, OperationKind, Options, PackageRecord, PackageStatus, fill_unknown,
};
use crate::error::Result;
use crate::exec::CommandRunner;
use crate::packages::PackageManager;
use crate::packages::runtime::{ManagerRuntime, base_name, complete_install, nothing_found, read_only};
use crate::utils::sanitize::{
    validate_optional_names, validate_package_name, validate_package_names,
};
use std::sync::Arc;

pub const MANAGER: &str = "apt";

const APT: &str = "apt";
const APT_CACHE: &str = "apt-cache";
const DPKG: &str = "dpkg";
const DPKG_QUERY: &str = "dpkg-query";

const STATUS_FORMAT: &str = "${binary:Package} ${Status} ${Version}\n";

pub struct AptManager {
    runtime: ManagerRuntime,
}

impl AptManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runtime: ManagerRuntime::new(MANAGER, runner, classify)
                .with_env("DEBIAN_FRONTEND", "noninteractive"),
        }
    }

    /// dpkg's view of `names`, or of every known package when empty.
    fn dpkg_status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        let mut args = vec!["-W".to_string(), "-f".to_string(), STATUS_FORMAT.to_string()];
        args.extend(names.iter().cloned());
        let raw = self
            .runtime
            .query(OperationKind::Status, DPKG_QUERY, args, opts)?;
        Ok(parse::parse_dpkg_query(&raw.combined_text()))
    }

    /// `apt <subcommand> [-y] [-s] <names>`
    fn apt_args(subcommand: &[&str], names: &[String], opts: &Options) -> Vec<String> {
        let mut args: Vec<String> = subcommand.iter().map(|s| s.to_string()).collect();
        if opts.assume_yes {
            args.push("-y".to_string());
        }
        if opts.dry_run {
            args.push("-s".to_string());
        }
        args.extend(names.iter().cloned());
        args
    }

    /// Install-style run: simulation under dry-run, otherwise "Setting up"
    /// lines plus a status pass for names apt left untouched.
    fn install_like(
        &self,
        operation: OperationKind,
        subcommand: &[&str],
        names: &[String],
        opts: &Options,
    ) -> Result<Vec<PackageRecord>> {
        let args = Self::apt_args(subcommand, names, opts);
        if opts.dry_run {
            let raw = self.runtime.query(operation, APT, args, opts)?;
            return Ok(parse::parse_simulation(&raw.stdout_text()));
        }
        match self.runtime.mutate(operation, APT, args, opts)? {
            Some(raw) => {
                let records = parse::parse_setting_up(&raw.stdout_text());
                complete_install(self, names, records, opts)
            }
            None if names.is_empty() => self.list_installed(&read_only(opts)),
            None => self.status(names, &read_only(opts)),
        }
    }

    fn remove_like(
        &self,
        operation: OperationKind,
        subcommand: &[&str],
        names: &[String],
        opts: &Options,
    ) -> Result<Vec<PackageRecord>> {
        let args = Self::apt_args(subcommand, names, opts);
        if opts.dry_run {
            let raw = self.runtime.query(operation, APT, args, opts)?;
            return Ok(parse::parse_simulation(&raw.stdout_text()));
        }
        match self.runtime.mutate(operation, APT, args, opts)? {
            Some(raw) => {
                let records = parse::parse_removing(&raw.stdout_text());
                complete_install(self, names, records, opts)
            }
            None if names.is_empty() => Ok(Vec::new()),
            None => self.status(names, &read_only(opts)),
        }
    }
}

impl PackageManager for AptManager {
    fn name(&self) -> &'static str {
        MANAGER
    }

    fn binary(&self) -> &'static str {
        APT
    }

    fn category(&self) -> ManagerCategory {
        ManagerCategory::System
    }

    fn is_available(&self) -> bool {
        self.runtime.probe(APT, "--version")
    }

    /// `apt search`, then a dpkg pass so locally installed packages the
    /// repository listing did not flag still report their real state.
    fn search(&self, keywords: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(keywords)?;
        let mut args = vec!["search".to_string()];
        args.extend(keywords.iter().cloned());
        let raw = self.runtime.query(OperationKind::Search, APT, args, opts)?;
        let mut records = parse::parse_search(&raw.stdout_text());

        let unresolved: Vec<String> = records
            .iter()
            .filter(|r| r.status == PackageStatus::Available)
            .map(|r| r.name.clone())
            .collect();
        if unresolved.is_empty() {
            return Ok(records);
        }

        let local = self.dpkg_status(&unresolved, opts)?;
        for record in records.iter_mut() {
            let Some(found) = local.iter().find(|l| l.name == record.name) else {
                continue;
            };
            match found.status {
                PackageStatus::Installed => {
                    let merged = PackageRecord::upgradable(
                        &record.name,
                        &found.installed_version,
                        &record.available_version,
                        MANAGER,
                    );
                    record.status = merged.status;
                    record.installed_version = merged.installed_version;
                }
                _ => {
                    for (key, value) in &found.extra {
                        record.extra.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
        }
        Ok(records)
    }

    fn list_installed(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let args = vec!["-W".to_string(), "-f".to_string(), STATUS_FORMAT.to_string()];
        let raw = self
            .runtime
            .query(OperationKind::ListInstalled, DPKG_QUERY, args, opts)?;
        Ok(parse::parse_installed(&raw.stdout_text()))
    }

    fn list_upgradable(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        let args = vec!["list".to_string(), "--upgradable".to_string()];
        let raw = self
            .runtime
            .query(OperationKind::ListUpgradable, APT, args, opts)?;
        Ok(parse::parse_upgradable(&raw.stdout_text()))
    }

    fn install(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        self.install_like(OperationKind::Install, &["install"], names, opts)
    }

    fn remove(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        self.remove_like(OperationKind::Remove, &["remove"], names, opts)
    }

    fn refresh(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        self.runtime
            .mutate(OperationKind::Refresh, APT, vec!["update".to_string()], opts)?;
        Ok(Vec::new())
    }

    fn upgrade(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_optional_names(names)?;
        if names.is_empty() {
            self.install_like(OperationKind::Upgrade, &["upgrade"], names, opts)
        } else {
            self.install_like(
                OperationKind::Upgrade,
                &["install", "--only-upgrade"],
                names,
                opts,
            )
        }
    }

    fn clean(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        if opts.dry_run {
            return Ok(Vec::new());
        }
        self.runtime
            .mutate(OperationKind::Clean, APT, vec!["autoclean".to_string()], opts)?;
        Ok(Vec::new())
    }

    fn autoremove(&self, opts: &Options) -> Result<Vec<PackageRecord>> {
        self.remove_like(OperationKind::Autoremove, &["autoremove"], &[], opts)
    }

    /// `dpkg --verify` per installed name; findings land in `extra`.
    fn verify(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let bases: Vec<String> = names.iter().map(|n| base_name(n).to_string()).collect();
        let records = fill_unknown(self.dpkg_status(&bases, opts)?, &bases, MANAGER);

        records
            .into_iter()
            .map(|record| {
                if record.status != PackageStatus::Installed {
                    return Ok(record);
                }
                let args = vec!["--verify".to_string(), record.name.clone()];
                let raw = self.runtime.query(OperationKind::Verify, DPKG, args, opts)?;
                let changed = parse::parse_verify(&raw.stdout_text());
                Ok(if changed.is_empty() {
                    record.with_extra("verify", "ok")
                } else {
                    record
                        .with_extra("verify", "modified")
                        .with_extra("modified_files", changed.join(","))
                })
            })
            .collect()
    }

    /// Candidate from `apt-cache show`, merged with dpkg's local state.
    fn get_info(&self, name: &str, opts: &Options) -> Result<PackageRecord> {
        validate_package_name(name)?;
        let args = vec!["show".to_string(), name.to_string()];
        let raw = self
            .runtime
            .query(OperationKind::GetInfo, APT_CACHE, args, opts)?;
        let Some(candidate) = parse::parse_show(&raw.stdout_text()) else {
            return Err(nothing_found(MANAGER, OperationKind::GetInfo, name, raw));
        };

        let local = self.dpkg_status(&[candidate.name.clone()], opts)?;
        let installed = local
            .iter()
            .find(|r| r.status == PackageStatus::Installed)
            .map(|r| r.installed_version.as_str())
            .unwrap_or_default();

        let mut record = PackageRecord::upgradable(
            &candidate.name,
            installed,
            &candidate.available_version,
            MANAGER,
        )
        .with_arch(&candidate.arch)
        .with_category(&candidate.category);
        record.extra = candidate.extra;
        Ok(record)
    }

    fn status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        let bases: Vec<String> = names.iter().map(|n| base_name(n).to_string()).collect();
        let records = self.dpkg_status(&bases, opts)?;
        Ok(fill_unknown(records, &bases, MANAGER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::OutcomeKind;
    use crate::exec::ExecutionResult;
    use crate::testing::MockRunner;

    fn manager(mock: &Arc<MockRunner>) -> AptManager {
        AptManager::new(mock.clone())
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const STATUS_CMD: &str = "dpkg-query -W -f ${binary:Package} ${Status} ${Version}\n";

    #[test]
    fn status_reports_installed_and_unknown() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            &format!("{STATUS_CMD} bash cloudflared byobu"),
            ExecutionResult::new(
                1,
                "bash install ok installed 5.1-6ubuntu1\ncloudflared install ok installed 2023.3.1\n",
                "dpkg-query: no packages found matching byobu\n",
            ),
        );

        let records = manager(&mock)
            .status(&names(&["bash", "cloudflared", "byobu"]), &Options::default())
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, PackageStatus::Installed);
        assert_eq!(records[1].installed_version, "2023.3.1");
        assert_eq!(records[2].name, "byobu");
        assert_eq!(records[2].status, PackageStatus::Unknown);
    }

    #[test]
    fn install_without_candidate_is_not_found() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "apt install -y nonexistent-pkg-xyz",
            ExecutionResult::new(
                100,
                "Reading package lists...\n",
                "E: Unable to locate package nonexistent-pkg-xyz\n",
            ),
        );

        let err = manager(&mock)
            .install(&names(&["nonexistent-pkg-xyz"]), &Options::assume_yes())
            .unwrap_err();
        assert_eq!(err.kind(), OutcomeKind::NotFound);
        assert_eq!(err.raw().map(|r| r.exit_code), Some(100));
    }

    #[test]
    fn install_reports_already_installed_names_through_status() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "apt install -y vim curl",
            ExecutionResult::new(
                0,
                "curl is already the newest version (7.81.0-1ubuntu1.15).\nSetting up vim (2:8.2.3995-1ubuntu2.15) ...\n",
                "",
            ),
        );
        mock.respond(
            &format!("{STATUS_CMD} curl"),
            ExecutionResult::new(0, "curl install ok installed 7.81.0-1ubuntu1.15\n", ""),
        );

        let records = manager(&mock)
            .install(&names(&["vim", "curl"]), &Options::assume_yes())
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == PackageStatus::Installed));
        assert_eq!(records[1].name, "curl");
    }

    #[test]
    fn dry_run_uses_simulation() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "apt install -y -s cowsay",
            ExecutionResult::new(
                0,
                "NOTE: This is only a simulation!\nInst cowsay (3.03+dfsg2-8 Ubuntu:22.04/jammy [all])\nConf cowsay (3.03+dfsg2-8 Ubuntu:22.04/jammy [all])\n",
                "",
            ),
        );
        let opts = Options {
            assume_yes: true,
            dry_run: true,
            ..Default::default()
        };

        let records = manager(&mock).install(&names(&["cowsay"]), &opts).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].planned_action(), Some("would-install"));
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn search_merges_local_state() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            "apt search cowsay",
            ExecutionResult::new(
                0,
                "Sorting...\nFull Text Search...\ncowsay/jammy 3.03+dfsg2-8 all\n  configurable talking cow\n\n",
                "",
            ),
        );
        mock.respond(
            &format!("{STATUS_CMD} cowsay"),
            ExecutionResult::new(0, "cowsay install ok installed 3.03+dfsg2-7\n", ""),
        );

        let records = manager(&mock).search(&names(&["cowsay"]), &Options::default()).unwrap();
        assert_eq!(records[0].status, PackageStatus::Upgradable);
        assert_eq!(records[0].installed_version, "3.03+dfsg2-7");
        assert_eq!(records[0].available_version, "3.03+dfsg2-8");
    }

    #[test]
    fn invalid_names_never_reach_the_runner() {
        let mock = Arc::new(MockRunner::new());
        let apt = manager(&mock);
        assert!(apt.install(&names(&["vim; rm -rf /"]), &Options::default()).is_err());
        assert!(apt.status(&[], &Options::default()).is_err());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn verify_records_modified_files() {
        let mock = Arc::new(MockRunner::new());
        mock.respond(
            &format!("{STATUS_CMD} vim nope"),
            ExecutionResult::new(
                1,
                "vim install ok installed 2:8.2.3995-1ubuntu2.15\n",
                "dpkg-query: no packages found matching nope\n",
            ),
        );
        mock.respond(
            "dpkg --verify vim",
            ExecutionResult::new(1, "??5?????? c /etc/vim/vimrc\n", ""),
        );

        let records = manager(&mock).verify(&names(&["vim", "nope"]), &Options::default()).unwrap();
        assert_eq!(records[0].extra["verify"], "modified");
        assert_eq!(records[0].extra["modified_files"], "/etc/vim/vimrc");
        assert_eq!(records[1].status, PackageStatus::Unknown);
    }
}
