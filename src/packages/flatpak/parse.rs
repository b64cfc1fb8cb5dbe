//! Parsers for flatpak's tab-separated `--columns` output.

use crate::core::types::PackageRecord;
use crate::parsers::{output_lines, parse_blocks};

use super::MANAGER;

/// Tab-separated rows, skipping blank lines and the header row flatpak
/// prints when attached to a terminal.
fn rows(text: &str, min_columns: usize) -> Vec<Vec<&str>> {
    output_lines(text)
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split('\t').map(str::trim).collect::<Vec<_>>())
        .filter(|cols| cols.len() >= min_columns)
        .filter(|cols| !matches!(cols[0], "Name" | "Application ID" | "Application"))
        .collect()
}

/// `flatpak search --columns=name,application,version,branch,remotes`
pub fn parse_search(text: &str) -> Vec<PackageRecord> {
    rows(text, 5)
        .into_iter()
        .map(|cols| {
            let remote = cols[4].split(',').next().unwrap_or_default();
            PackageRecord::available(cols[1], cols[2], MANAGER)
                .with_category(remote)
                .with_extra("display_name", cols[0])
                .with_extra("branch", cols[3])
        })
        .collect()
}

/// `flatpak list --columns=application,version,branch,arch,origin,active`
pub fn parse_list(text: &str) -> Vec<PackageRecord> {
    rows(text, 5)
        .into_iter()
        .map(|cols| {
            let record = PackageRecord::installed(cols[0], cols[1], MANAGER)
                .with_arch(cols[3])
                .with_category(cols[4])
                .with_extra("branch", cols[2]);
            with_commit(record, cols.get(5))
        })
        .collect()
}

/// `flatpak remote-ls --updates --app --columns=application,version,branch,origin,commit`
pub fn parse_updates(text: &str) -> Vec<PackageRecord> {
    rows(text, 4)
        .into_iter()
        .map(|cols| {
            let record = PackageRecord::available(cols[0], cols[1], MANAGER)
                .with_category(cols[3])
                .with_extra("branch", cols[2]);
            with_commit(record, cols.get(4))
        })
        .collect()
}

fn with_commit(record: PackageRecord, commit: Option<&&str>) -> PackageRecord {
    match commit {
        Some(commit) if !commit.is_empty() => record.with_extra("commit", *commit),
        _ => record,
    }
}

/// `flatpak info` / `flatpak remote-info` key-value output.
pub fn parse_info(text: &str, installed: bool) -> Option<PackageRecord> {
    let block = parse_blocks(text)
        .into_iter()
        .find(|b| b.get("ID").is_some() || b.get("Ref").is_some())?;

    let id = match block.get("ID") {
        Some(id) => id,
        None => block.get("Ref")?.split('/').nth(1)?,
    };
    let version = block.get("Version").unwrap_or_default();
    let record = if installed {
        PackageRecord::installed(id, version, MANAGER)
    } else {
        PackageRecord::available(id, version, MANAGER)
    };
    let mut record = record
        .with_arch(block.get("Arch").unwrap_or_default())
        .with_category(block.get("Origin").unwrap_or_default());
    for key in ["Branch", "Ref", "Installation", "Runtime", "License"] {
        if let Some(value) = block.get(key) {
            record = record.with_extra(&key.to_lowercase(), value);
        }
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PackageStatus;

    #[test]
    fn search_rows() {
        let text = "Firefox\torg.mozilla.firefox\t121.0\tstable\tflathub\nGIMP\torg.gimp.GIMP\t2.10.36\tstable\tflathub,fedora\n";
        let records = parse_search(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "org.mozilla.firefox");
        assert_eq!(records[0].extra["display_name"], "Firefox");
        assert_eq!(records[1].category, "flathub");
        assert!(parse_search("No matches found\n").is_empty());
    }

    #[test]
    fn list_skips_header() {
        let text = "Application ID\tVersion\tBranch\tArch\tOrigin\norg.mozilla.firefox\t121.0\tstable\tx86_64\tflathub\norg.gnome.Calculator\t\tstable\tx86_64\tflathub\n";
        let records = parse_list(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, PackageStatus::Installed);
        assert_eq!(records[0].arch, "x86_64");
        assert_eq!(records[1].installed_version, "");
        assert!(!records[1].extra.contains_key("commit"));
    }

    #[test]
    fn list_and_updates_carry_commits() {
        let local = parse_list("org.gnome.Calculator\t\tstable\tx86_64\tflathub\t1a2b3c4d5e6f\n");
        assert_eq!(local[0].extra["commit"], "1a2b3c4d5e6f");
        let updates = parse_updates("org.gnome.Calculator\t46.1\tstable\tflathub\t9f8e7d6c5b4a\n");
        assert_eq!(updates[0].available_version, "46.1");
        assert_eq!(updates[0].extra["commit"], "9f8e7d6c5b4a");
    }

    #[test]
    fn info_installed() {
        let text = "Firefox - Fast, Private & Safe Web Browser\n\n          ID: org.mozilla.firefox\n         Ref: app/org.mozilla.firefox/x86_64/stable\n        Arch: x86_64\n      Branch: stable\n     Version: 121.0\n     License: MPL-2.0\n      Origin: flathub\nInstallation: system\n";
        let record = parse_info(text, true).unwrap();
        assert_eq!(record.name, "org.mozilla.firefox");
        assert_eq!(record.installed_version, "121.0");
        assert_eq!(record.category, "flathub");
        assert_eq!(record.extra["installation"], "system");
    }

    #[test]
    fn remote_info_without_id_uses_ref() {
        let text = "        Ref: app/org.gimp.GIMP/x86_64/stable\n       Arch: x86_64\n    Version: 2.10.36\n";
        let record = parse_info(text, false).unwrap();
        assert_eq!(record.name, "org.gimp.GIMP");
        assert_eq!(record.status, PackageStatus::Available);
        assert_eq!(record.available_version, "2.10.36");
    }
}
