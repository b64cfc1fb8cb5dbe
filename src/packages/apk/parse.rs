//! Parsers for Alpine's `apk` output.

use crate::core::types::{PackageRecord, PlannedAction};
use crate::parsers::{output_lines, split_apk_name};
use regex::Regex;
use std::sync::LazyLock;

use super::MANAGER;

/// `name-ver-rN arch {origin} (license) [flags]` from `apk list`
static LIST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(\S+)\s+\{([^}]*)\}\s+\(([^)]*)\)(?:\s+\[(.+)\])?$")
        .expect("Invalid regex pattern")
});

/// `(1/3) Installing xxd (9.0.2127-r0)` from add/del/upgrade
static CHANGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\(\d+/\d+\)\s+(Installing|Upgrading|Purging|Deleting|Downgrading|Reinstalling|Replacing)\s+(\S+)\s+\((.+)\)",
    )
    .expect("Invalid regex pattern")
});

/// One `apk list` line.
pub fn parse_list_line(line: &str) -> Option<PackageRecord> {
    let caps = LIST_LINE.captures(line.trim())?;
    let (name, version) = split_apk_name(&caps[1])?;
    let flags = caps.get(5).map(|m| m.as_str()).unwrap_or_default();

    let record = if let Some(old) = flags.strip_prefix("upgradable from: ") {
        let installed = split_apk_name(old.trim()).map(|(_, v)| v).unwrap_or_default();
        PackageRecord::upgradable(name, installed, version, MANAGER)
    } else if flags.starts_with("installed") {
        PackageRecord::installed(name, version, MANAGER)
    } else {
        PackageRecord::available(name, version, MANAGER)
    };
    Some(
        record
            .with_arch(&caps[2])
            .with_extra("origin", &caps[3])
            .with_extra("license", &caps[4]),
    )
}

pub fn parse_list(text: &str) -> Vec<PackageRecord> {
    output_lines(text)
        .into_iter()
        .filter_map(parse_list_line)
        .collect()
}

/// `apk search -v`: `name-ver-rN - description`
pub fn parse_search(text: &str) -> Vec<PackageRecord> {
    output_lines(text)
        .into_iter()
        .filter_map(|line| {
            let (token, description) = match line.trim().split_once(" - ") {
                Some((token, description)) => (token, description),
                None => (line.trim(), ""),
            };
            let (name, version) = split_apk_name(token)?;
            let record = PackageRecord::available(name, version, MANAGER);
            Some(if description.is_empty() {
                record
            } else {
                record.with_extra("summary", description)
            })
        })
        .collect()
}

/// Change lines from `apk add`, `apk del` and `apk upgrade`.
///
/// With `planned` set (a `--simulate` run) records are tagged with the
/// action that would have happened.
pub fn parse_changes(text: &str, planned: bool) -> Vec<PackageRecord> {
    let mut records: Vec<PackageRecord> = Vec::new();
    for line in output_lines(text) {
        let Some(caps) = CHANGE_LINE.captures(line.trim()) else {
            continue;
        };
        let name = &caps[2];
        let versions = &caps[3];
        let record = match (&caps[1], planned) {
            ("Purging" | "Deleting", true) => {
                PackageRecord::installed(name, versions, MANAGER).planned(PlannedAction::WouldRemove)
            }
            ("Purging" | "Deleting", false) => PackageRecord::available(name, "", MANAGER)
                .with_extra("removed_version", versions),
            ("Upgrading" | "Downgrading" | "Replacing", _) => {
                let (old, new) = versions.split_once(" -> ").unwrap_or(("", versions));
                if planned {
                    PackageRecord::upgradable(name, old, new, MANAGER)
                        .planned(PlannedAction::WouldUpgrade)
                } else {
                    PackageRecord::installed(name, new, MANAGER)
                }
            }
            (_, true) => PackageRecord::available(name, versions, MANAGER)
                .planned(PlannedAction::WouldInstall),
            (_, false) => PackageRecord::installed(name, versions, MANAGER),
        };
        records.retain(|r| r.name != record.name);
        records.push(record);
    }
    records
}

/// Package names listed by `apk audit --packages`.
pub fn parse_audit_packages(text: &str) -> Vec<String> {
    output_lines(text)
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PackageStatus;

    #[test]
    fn list_lines() {
        let text = "vim-9.0.2127-r0 x86_64 {vim} (Vim) [installed]\nmusl-1.2.4-r2 x86_64 {musl} (MIT) [upgradable from: musl-1.2.4-r1]\npy3-pip-23.3.1-r0 noarch {py3-pip} (MIT)\n";
        let records = parse_list(text);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, PackageStatus::Installed);
        assert_eq!(records[0].installed_version, "9.0.2127-r0");
        assert_eq!(records[1].status, PackageStatus::Upgradable);
        assert_eq!(records[1].installed_version, "1.2.4-r1");
        assert_eq!(records[1].available_version, "1.2.4-r2");
        assert_eq!(records[2].name, "py3-pip");
        assert_eq!(records[2].status, PackageStatus::Available);
        assert_eq!(records[2].extra["license"], "MIT");
    }

    #[test]
    fn search_lines() {
        let text = "vim-9.0.2127-r0 - Improved vi-style text editor\nvim-doc-9.0.2127-r0 - Improved vi-style text editor (documentation)\nWARNING: opening repo: No such file\n";
        let records = parse_search(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "vim-doc");
        assert_eq!(records[0].extra["summary"], "Improved vi-style text editor");
    }

    #[test]
    fn add_and_simulated_add() {
        let text = "(1/2) Installing xxd (9.0.2127-r0)\n(2/2) Installing vim (9.0.2127-r0)\nExecuting busybox-1.36.1-r15.trigger\nOK: 30 MiB in 26 packages\n";
        let records = parse_changes(text, false);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == PackageStatus::Installed));

        let planned = parse_changes(text, true);
        assert_eq!(planned[1].planned_action(), Some("would-install"));
        assert_eq!(planned[1].available_version, "9.0.2127-r0");
    }

    #[test]
    fn upgrade_and_purge() {
        let text = "(1/2) Upgrading musl (1.2.4-r1 -> 1.2.4-r2)\n(2/2) Purging vim (9.0.2127-r0)\n";
        let records = parse_changes(text, false);
        assert_eq!(records[0].installed_version, "1.2.4-r2");
        assert_eq!(records[1].status, PackageStatus::Available);
        assert_eq!(records[1].extra["removed_version"], "9.0.2127-r0");

        let planned = parse_changes(text, true);
        assert_eq!(planned[0].status, PackageStatus::Upgradable);
        assert_eq!(planned[1].planned_action(), Some("would-remove"));
    }
}
