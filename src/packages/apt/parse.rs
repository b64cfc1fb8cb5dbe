//! Parsers for apt, dpkg-query and apt-cache output.

use crate::core::types::{PackageRecord, PackageStatus, PlannedAction};
use crate::parsers::{output_lines, parse_blocks, split_name_arch, split_name_suite};
use regex::Regex;
use std::sync::LazyLock;

use super::MANAGER;

/// Extra-metadata key marking packages removed but with config files left
pub const CONFIG_FILES: &str = "config_files";

/// `name/suite[,suite] version arch [flags]` from `apt search` / `apt list`
static LIST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\s/]+/\S*)\s+(\S+)\s+(\S+)(?:\s+\[([^\]]*)\])?\s*$")
        .expect("Invalid regex pattern")
});

/// `${binary:Package} ${Status} ${Version}` from dpkg-query
static DPKG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(\S+)\s+(\S+)\s+(\S+)(?:\s+(\S+))?\s*$").expect("Invalid regex pattern")
});

static DPKG_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"no packages found matching (\S+?)\.?$").expect("Invalid regex pattern")
});

static SETTING_UP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Setting up (\S+) \(([^)]+)\)").expect("Invalid regex pattern")
});

static REMOVING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Removing (\S+) \(([^)]+)\)").expect("Invalid regex pattern")
});

/// `Inst name [old] (new suite [arch])`
static SIM_INST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Inst (\S+)(?: \[([^\]]+)\])? \((\S+)\s*([^\[)]*)(?:\[([^\]]+)\])?\)")
        .expect("Invalid regex pattern")
});

/// `Remv name [old]`
static SIM_REMV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Remv (\S+)(?: \[([^\]]+)\])?").expect("Invalid regex pattern")
});

/// `??5?????? c /etc/foo.conf` from `dpkg --verify`
static VERIFY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([?.A-Za-z0-9]{9})\s+(?:[cdglr]\s+)?(/.*)$").expect("Invalid regex pattern")
});

/// One `apt search` / `apt list` line.
///
/// Flags decide the status: `installed` alone means installed,
/// `installed,upgradable to: X` and `upgradable from: X` mean upgradable,
/// `residual-config` means removed with configuration left behind.
pub fn parse_list_line(line: &str) -> Option<PackageRecord> {
    let caps = LIST_LINE.captures(line)?;
    let (name, suite) = split_name_suite(&caps[1]);
    let version = &caps[2];
    let arch = &caps[3];
    let flags = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

    let record = if let Some(candidate) = flag_value(flags, "upgradable to:") {
        PackageRecord::upgradable(name, version, candidate, MANAGER)
    } else if let Some(installed) = flag_value(flags, "upgradable from:") {
        PackageRecord::upgradable(name, installed, version, MANAGER)
    } else if flags.split(',').any(|f| f.trim() == "installed") {
        let record = PackageRecord::installed(name, version, MANAGER);
        if flags.contains("automatic") {
            record.with_extra("automatic", "true")
        } else {
            record
        }
    } else if flags.contains("residual-config") {
        PackageRecord::available(name, version, MANAGER).with_extra(CONFIG_FILES, "true")
    } else {
        PackageRecord::available(name, version, MANAGER)
    };

    Some(record.with_category(suite).with_arch(arch))
}

fn flag_value<'a>(flags: &'a str, marker: &str) -> Option<&'a str> {
    let start = flags.find(marker)? + marker.len();
    let rest = flags[start..].trim_start();
    let value = rest.split(',').next().unwrap_or_default().trim();
    (!value.is_empty()).then_some(value)
}

/// `apt search` output: record lines followed by indented descriptions.
pub fn parse_search(text: &str) -> Vec<PackageRecord> {
    let lines = output_lines(text);
    let mut records: Vec<PackageRecord> = Vec::new();

    for line in lines {
        if let Some(record) = parse_list_line(line) {
            records.push(record);
        } else if let Some(desc) = line.strip_prefix("  ")
            && let Some(last) = records.last_mut()
            && !last.extra.contains_key("summary")
        {
            last.extra.insert("summary".to_string(), desc.trim().to_string());
        }
    }
    records
}

/// `apt list --upgradable` output.
pub fn parse_upgradable(text: &str) -> Vec<PackageRecord> {
    output_lines(text)
        .into_iter()
        .filter_map(parse_list_line)
        .filter(|r| r.status == PackageStatus::Upgradable)
        .collect()
}

/// dpkg-query status output, including its "no packages found" complaints.
///
/// Accepts stdout and stderr concatenated. Every name dpkg-query reports
/// yields one record; names it could not find become `Unknown`.
pub fn parse_dpkg_query(text: &str) -> Vec<PackageRecord> {
    let mut records = Vec::new();

    for line in output_lines(text) {
        let line = line.trim();
        if let Some(caps) = DPKG_NOT_FOUND.captures(line) {
            records.push(PackageRecord::unknown(&caps[1], MANAGER));
            continue;
        }
        let Some(caps) = DPKG_LINE.captures(line) else {
            continue;
        };
        let (name, arch) = split_name_arch(&caps[1]);
        let state = &caps[4];
        let version = caps.get(5).map(|m| m.as_str()).unwrap_or_default();

        let record = match state {
            "installed" | "triggers-awaited" | "triggers-pending" => {
                PackageRecord::installed(name, version, MANAGER)
            }
            // Removed but configuration kept: reported as available, with
            // the distinction preserved in extra metadata.
            "config-files" => PackageRecord::available(name, "", MANAGER)
                .with_extra(CONFIG_FILES, "true")
                .with_extra("removed_version", version),
            "not-installed" => PackageRecord::available(name, version, MANAGER),
            other => PackageRecord::unknown(name, MANAGER).with_extra("dpkg_state", other),
        };
        records.push(record.with_arch(arch));
    }
    records
}

/// Installed packages from a full dpkg-query listing.
pub fn parse_installed(text: &str) -> Vec<PackageRecord> {
    parse_dpkg_query(text)
        .into_iter()
        .filter(|r| r.status == PackageStatus::Installed)
        .collect()
}

/// `Setting up name:arch (version) ...` lines from install/upgrade runs.
pub fn parse_setting_up(text: &str) -> Vec<PackageRecord> {
    let mut records: Vec<PackageRecord> = Vec::new();
    for line in output_lines(text) {
        let Some(caps) = SETTING_UP.captures(line.trim()) else {
            continue;
        };
        let (name, arch) = split_name_arch(&caps[1]);
        let record = PackageRecord::installed(name, &caps[2], MANAGER).with_arch(arch);
        // Triggers can configure a package twice; the last line wins
        records.retain(|r| r.name != record.name);
        records.push(record);
    }
    records
}

/// `Removing name:arch (version) ...` lines from remove/autoremove runs.
pub fn parse_removing(text: &str) -> Vec<PackageRecord> {
    output_lines(text)
        .into_iter()
        .filter_map(|line| {
            let caps = REMOVING.captures(line.trim())?;
            let (name, arch) = split_name_arch(&caps[1]);
            Some(
                PackageRecord::available(name, "", MANAGER)
                    .with_arch(arch)
                    .with_extra("removed_version", &caps[2]),
            )
        })
        .collect()
}

/// `-s` simulation output: `Inst` and `Remv` lines, tagged as planned.
pub fn parse_simulation(text: &str) -> Vec<PackageRecord> {
    let mut records = Vec::new();
    for line in output_lines(text) {
        let line = line.trim();
        if let Some(caps) = SIM_INST.captures(line) {
            let name = &caps[1];
            let new_version = &caps[3];
            let suite = caps
                .get(4)
                .and_then(|m| m.as_str().split(',').next())
                .and_then(|origin| origin.trim().split('/').nth(1))
                .unwrap_or_default();
            let arch = caps.get(5).map(|m| m.as_str()).unwrap_or_default();

            let record = match caps.get(2) {
                Some(old) => PackageRecord::upgradable(name, old.as_str(), new_version, MANAGER)
                    .planned(PlannedAction::WouldUpgrade),
                None => PackageRecord::available(name, new_version, MANAGER)
                    .planned(PlannedAction::WouldInstall),
            };
            records.push(record.with_category(suite).with_arch(arch));
        } else if let Some(caps) = SIM_REMV.captures(line) {
            let version = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            records.push(
                PackageRecord::installed(&caps[1], version, MANAGER)
                    .planned(PlannedAction::WouldRemove),
            );
        }
    }
    records
}

/// First stanza of `apt-cache show`: the candidate apt would install.
pub fn parse_show(text: &str) -> Option<PackageRecord> {
    let block = parse_blocks(text).into_iter().find(|b| b.get("Package").is_some())?;
    let name = block.get("Package")?;
    let version = block.get("Version").unwrap_or_default();

    let mut record = PackageRecord::available(name, version, MANAGER)
        .with_arch(block.get("Architecture").unwrap_or_default())
        .with_category(block.get("Section").unwrap_or_default());

    for key in ["Maintainer", "Installed-Size", "Priority", "Homepage"] {
        if let Some(value) = block.get(key) {
            record = record.with_extra(&key.to_lowercase(), value);
        }
    }
    let summary = block
        .get("Description")
        .or_else(|| block.get("Description-en"))
        .and_then(|d| d.lines().next());
    if let Some(summary) = summary {
        record = record.with_extra("summary", summary);
    }
    Some(record)
}

/// Files `dpkg --verify` reports as changed.
pub fn parse_verify(text: &str) -> Vec<String> {
    output_lines(text)
        .into_iter()
        .filter_map(|line| VERIFY_LINE.captures(line.trim()))
        .map(|caps| caps[2].trim().to_string())
        .collect()
}
