//! Parsers for yum/dnf and rpm output.

use crate::core::types::PackageRecord;
use crate::parsers::{is_known_arch, output_lines, parse_blocks, split_nevra};
use regex::Regex;
use std::sync::LazyLock;

use super::MANAGER;

/// `name.arch : summary` from `yum search`
static SEARCH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\.([A-Za-z0-9_]+)\s*:\s*(.*)$").expect("Invalid regex pattern")
});

/// `package foo is not installed` from `rpm -q`
static RPM_NOT_INSTALLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^package (\S+) is not installed").expect("Invalid regex pattern")
});

/// `name.arch` -> (`name`, `arch`) when the suffix is a real architecture.
pub fn split_name_dot_arch(token: &str) -> Option<(&str, &str)> {
    let (name, arch) = token.rsplit_once('.')?;
    (is_known_arch(arch) && !name.is_empty()).then_some((name, arch))
}

/// `yum search` output. Section banners (`=== Name Matched: vim ===`) and
/// metadata notices are skipped; records carry no version.
pub fn parse_search(text: &str) -> Vec<PackageRecord> {
    let mut records: Vec<PackageRecord> = Vec::new();
    for line in output_lines(text) {
        let Some(caps) = SEARCH_LINE.captures(line.trim()) else {
            continue;
        };
        if !is_known_arch(&caps[2]) {
            continue;
        }
        let name = &caps[1];
        if records.iter().any(|r| r.name == name) {
            continue;
        }
        records.push(
            PackageRecord::available(name, "", MANAGER)
                .with_arch(&caps[2])
                .with_extra("summary", caps[3].trim()),
        );
    }
    records
}

/// `rpm -q[a] --qf '%{NAME} [E:]V-R %{ARCH}\n'` output.
///
/// Installed lines become `Installed`; "is not installed" lines become
/// `Unknown`, since rpm cannot tell whether a repository carries the name.
pub fn parse_rpm_query(text: &str) -> Vec<PackageRecord> {
    output_lines(text)
        .into_iter()
        .filter_map(|line| {
            let line = line.trim();
            if let Some(caps) = RPM_NOT_INSTALLED.captures(line) {
                return Some(PackageRecord::unknown(&caps[1], MANAGER));
            }
            let mut parts = line.split_whitespace();
            let (name, version, arch) = (parts.next()?, parts.next()?, parts.next()?);
            if parts.next().is_some() {
                return None;
            }
            Some(PackageRecord::installed(name, version, MANAGER).with_arch(arch))
        })
        .collect()
}

/// `yum check-update -q` output: `name.arch  [E:]V-R  repo` rows.
///
/// Long names wrap the rest of the row onto the next line. The listing ends
/// at the "Obsoleting Packages" section.
pub fn parse_check_update(text: &str) -> Vec<PackageRecord> {
    let mut records = Vec::new();
    let mut pending: Option<String> = None;

    for line in output_lines(text) {
        let trimmed = line.trim();
        if trimmed.starts_with("Obsoleting Packages") {
            break;
        }
        let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let carried = pending.take();
        if let Some(first) = carried.as_deref()
            && tokens.len() == 2
        {
            tokens.insert(0, first);
        }

        match tokens.as_slice() {
            [name_arch] if split_name_dot_arch(name_arch).is_some() => {
                pending = Some(name_arch.to_string());
            }
            [name_arch, version, repo] => {
                let Some((name, arch)) = split_name_dot_arch(name_arch) else {
                    continue;
                };
                records.push(
                    PackageRecord::available(name, version, MANAGER)
                        .with_arch(arch)
                        .with_category(repo),
                );
            }
            _ => {}
        }
    }
    records
}

/// Which transaction-summary section a NEVRA token was listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Added,
    Removed,
}

fn section_for(header: &str) -> Option<Section> {
    let header = header.trim().trim_end_matches(':');
    match header {
        "Installed" | "Upgraded" | "Updated" | "Reinstalled" | "Downgraded"
        | "Dependency Installed" | "Dependency Updated" | "Installed dependencies"
        | "Installed weak dependencies" => Some(Section::Added),
        "Removed" | "Erased" | "Dependency Removed" | "Removed dependencies" => {
            Some(Section::Removed)
        }
        _ => None,
    }
}

/// Transaction summary after install/upgrade/remove: NEVRA tokens listed
/// under `Installed:`, `Upgraded:`, `Removed:` and friends.
pub fn parse_transaction(text: &str) -> Vec<PackageRecord> {
    let mut records: Vec<PackageRecord> = Vec::new();
    let mut section = None;

    for line in output_lines(text) {
        if line.trim().is_empty() || line.trim() == "Complete!" {
            section = None;
            continue;
        }
        if !line.starts_with(' ') && line.trim_end().ends_with(':') {
            section = section_for(line);
            continue;
        }
        let Some(current) = section else {
            continue;
        };
        for token in line.split_whitespace() {
            let Some(nevra) = split_nevra(token) else {
                continue;
            };
            let record = match current {
                Section::Added => PackageRecord::installed(nevra.name, nevra.version, MANAGER),
                Section::Removed => PackageRecord::available(nevra.name, "", MANAGER)
                    .with_extra("removed_version", nevra.version),
            };
            records.retain(|r| r.name != record.name);
            records.push(record.with_arch(nevra.arch));
        }
    }
    records
}

/// `yum info` output: the installed stanza and the candidate stanza for one
/// name, folded into a single record.
pub fn parse_info(text: &str, name: &str) -> Option<PackageRecord> {
    let mut installed: Option<(String, String, String)> = None;
    let mut candidate: Option<(String, String, String)> = None;
    let mut summary = String::new();
    let mut in_installed = false;

    for section in split_sections(text) {
        match section.header {
            "Installed Packages" => in_installed = true,
            "Available Packages" | "Available Upgrades" => in_installed = false,
            _ => {}
        }
        for block in parse_blocks(&section.body) {
            if block.get("Name") != Some(name) {
                continue;
            }
            let version = match (block.get("Epoch"), block.get("Version"), block.get("Release")) {
                (_, None, _) => continue,
                (Some(e), Some(v), Some(r)) if e != "0" => format!("{e}:{v}-{r}"),
                (_, Some(v), Some(r)) => format!("{v}-{r}"),
                (_, Some(v), None) => v.to_string(),
            };
            let arch = block
                .get("Architecture")
                .or_else(|| block.get("Arch"))
                .unwrap_or_default()
                .to_string();
            let repo = block
                .get("From repo")
                .or_else(|| block.get("Repository"))
                .unwrap_or_default()
                .to_string();
            if summary.is_empty() {
                summary = block.get("Summary").unwrap_or_default().to_string();
            }
            let slot = if in_installed { &mut installed } else { &mut candidate };
            slot.get_or_insert((version, arch, repo));
        }
    }

    let record = match (&installed, &candidate) {
        (None, None) => return None,
        (Some((iv, arch, repo)), cand) => {
            let cv = cand.as_ref().map(|c| c.0.as_str()).unwrap_or_default();
            PackageRecord::upgradable(name, iv, cv, MANAGER)
                .with_arch(arch)
                .with_category(repo)
        }
        (None, Some((cv, arch, repo))) => PackageRecord::available(name, cv, MANAGER)
            .with_arch(arch)
            .with_category(repo),
    };
    Some(if summary.is_empty() {
        record
    } else {
        record.with_extra("summary", summary)
    })
}

struct InfoSection<'a> {
    header: &'a str,
    body: String,
}

/// Split `yum info` text at its unindented, colon-free banner lines.
fn split_sections(text: &str) -> Vec<InfoSection<'_>> {
    let mut sections = vec![InfoSection {
        header: "",
        body: String::new(),
    }];
    for line in output_lines(text) {
        let is_banner = !line.is_empty() && !line.starts_with(' ') && !line.contains(':');
        if is_banner {
            sections.push(InfoSection {
                header: line.trim(),
                body: String::new(),
            });
        } else if let Some(current) = sections.last_mut() {
            current.body.push_str(line);
            current.body.push('\n');
        }
    }
    sections
}

/// Files `rpm -V` reports as changed or missing, as (flags, path).
pub fn parse_verify(text: &str) -> Vec<(String, String)> {
    output_lines(text)
        .into_iter()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            if flags.len() != 9 && flags != "missing" {
                return None;
            }
            let path = parts.last()?;
            path.starts_with('/').then(|| (flags.to_string(), path.to_string()))
        })
        .collect()
}
