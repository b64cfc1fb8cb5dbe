//! Parsers for `snap` table and info output.

use crate::core::types::PackageRecord;
use crate::parsers::{output_lines, split_columns};
use regex::Regex;
use std::sync::LazyLock;

use super::MANAGER;

/// `name (channel) version from Publisher✓ installed|refreshed`
static CHANGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)(?:\s+\(([^)]*)\))?\s+(\S+)\s+from\s+(.+?)\s+(installed|refreshed)$")
        .expect("Invalid regex pattern")
});

static REMOVED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+) removed").expect("Invalid regex pattern"));

/// Drop the verified/starred markers snap appends to publisher names.
fn publisher(raw: &str) -> &str {
    raw.trim_end_matches(['✓', '*', '🌟'])
}

/// Data rows of a snap table, header row excluded.
fn table_rows(text: &str, columns: usize) -> Vec<Vec<&str>> {
    output_lines(text)
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| split_columns(line, columns))
        .filter(|cols| cols.len() == columns && cols[0] != "Name")
        .collect()
}

/// `snap find` table: Name Version Publisher Notes Summary.
pub fn parse_find(text: &str) -> Vec<PackageRecord> {
    table_rows(text, 5)
        .into_iter()
        .map(|cols| {
            PackageRecord::available(cols[0], cols[1], MANAGER)
                .with_extra("publisher", publisher(cols[2]))
                .with_extra("summary", cols[4])
        })
        .collect()
}

/// `snap list` table: Name Version Rev Tracking Publisher Notes.
///
/// Disabled revisions are left out; they are not the active install.
pub fn parse_list(text: &str) -> Vec<PackageRecord> {
    table_rows(text, 6)
        .into_iter()
        .filter(|cols| !cols[5].contains("disabled"))
        .map(|cols| {
            let record = PackageRecord::installed(cols[0], cols[1], MANAGER)
                .with_category(cols[3])
                .with_extra("revision", cols[2])
                .with_extra("publisher", publisher(cols[4]));
            if cols[5] == "-" {
                record
            } else {
                record.with_extra("notes", cols[5])
            }
        })
        .collect()
}

/// `snap refresh --list` table: Name Version Rev Size Publisher Notes.
/// Records carry the candidate version only.
pub fn parse_refresh_list(text: &str) -> Vec<PackageRecord> {
    table_rows(text, 6)
        .into_iter()
        .map(|cols| {
            PackageRecord::available(cols[0], cols[1], MANAGER)
                .with_extra("revision", cols[2])
                .with_extra("publisher", publisher(cols[4]))
        })
        .collect()
}

/// Lines snap prints after `install` or `refresh`.
pub fn parse_changes(text: &str) -> Vec<PackageRecord> {
    output_lines(text)
        .into_iter()
        .filter_map(|line| {
            let caps = CHANGE_LINE.captures(line.trim())?;
            let record = PackageRecord::installed(&caps[1], &caps[3], MANAGER)
                .with_extra("publisher", publisher(&caps[4]));
            Some(match caps.get(2) {
                Some(channel) => record.with_category(channel.as_str()),
                None => record,
            })
        })
        .collect()
}

/// `name removed` lines from `snap remove`.
pub fn parse_removed(text: &str) -> Vec<PackageRecord> {
    output_lines(text)
        .into_iter()
        .filter_map(|line| REMOVED_LINE.captures(line.trim()))
        .map(|caps| PackageRecord::available(&caps[1], "", MANAGER))
        .collect()
}

/// `snap info` output for one snap.
///
/// The candidate is the version on the tracked channel, or on
/// `latest/stable` when the snap is not installed.
pub fn parse_info(text: &str) -> Option<PackageRecord> {
    let mut fields: Vec<(&str, &str)> = Vec::new();
    let mut channels: Vec<(&str, &str)> = Vec::new();
    let mut in_channels = false;

    for line in output_lines(text) {
        let indented = line.starts_with(' ');
        if !indented {
            in_channels = line.starts_with("channels:");
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if indented {
            if in_channels {
                let version = value.split_whitespace().next().unwrap_or_default();
                channels.push((key.trim(), version));
            }
            continue;
        }
        fields.push((key.trim(), value.trim()));
    }

    let field = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .unwrap_or_default()
    };
    let name = field("name");
    if name.is_empty() {
        return None;
    }

    let installed = field("installed").split_whitespace().next().unwrap_or_default();
    let tracking = field("tracking");
    let channel = if tracking.is_empty() { "latest/stable" } else { tracking };
    let candidate = channels
        .iter()
        .find(|(c, _)| *c == channel)
        .map(|(_, v)| *v)
        .filter(|v| *v != "^" && *v != "--")
        .unwrap_or_default();

    let record = if installed.is_empty() {
        PackageRecord::available(name, candidate, MANAGER)
    } else {
        PackageRecord::upgradable(name, installed, candidate, MANAGER)
    };
    Some(
        record
            .with_category(channel)
            .with_extra("publisher", publisher(field("publisher")))
            .with_extra("summary", field("summary")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PackageStatus;

    #[test]
    fn find_table() {
        let text = "Name         Version  Publisher     Notes  Summary\nhello-world  6.4      canonical✓    -      The 'hello-world' of snaps\nhello        2.10     canonical✓    -      GNU Hello, the \"hello world\" snap\n";
        let records = parse_find(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "hello-world");
        assert_eq!(records[0].available_version, "6.4");
        assert_eq!(records[0].extra["publisher"], "canonical");
        assert_eq!(records[1].extra["summary"], "GNU Hello, the \"hello world\" snap");
    }

    #[test]
    fn list_skips_disabled_revisions() {
        let text = "Name      Version        Rev    Tracking         Publisher   Notes\ncore22    20231123       1033   latest/stable    canonical✓  base\nfirefox   121.0-1        3600   latest/stable/…  mozilla✓    -\nfirefox   120.0.1-1      3504   latest/stable/…  mozilla✓    disabled\n";
        let records = parse_list(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].extra["notes"], "base");
        assert_eq!(records[1].installed_version, "121.0-1");
        assert_eq!(records[1].status, PackageStatus::Installed);
        assert!(!records[1].extra.contains_key("notes"));
    }

    #[test]
    fn refresh_list_table() {
        let text = "Name     Version  Rev   Size   Publisher  Notes\nfirefox  122.0-2  3728  275MB  mozilla✓   -\n";
        let records = parse_refresh_list(text);
        assert_eq!(records[0].available_version, "122.0-2");
        assert!(parse_refresh_list("All snaps up to date.\n").is_empty());
    }

    #[test]
    fn change_lines() {
        let text = "hello-world 6.4 from Canonical✓ installed\nfirefox (beta) 122.0b9-1 from Mozilla✓ refreshed\n";
        let records = parse_changes(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].extra["publisher"], "Canonical");
        assert_eq!(records[1].category, "beta");
        assert_eq!(parse_removed("hello-world removed\n")[0].name, "hello-world");
    }

    #[test]
    fn info_with_installed_revision() {
        let text = "name:      hello-world\nsummary:   The 'hello-world' of snaps\npublisher: Canonical✓\nlicense:   unset\ndescription: |\n  This is a simple hello world example.\nsnap-id:      buPKUD3TKqCOgLEjjHx5kSiCpIs5cMuQ\ntracking:     latest/stable\nchannels:\n  latest/stable:    6.5 2023-01-10 (31) 20kB -\n  latest/candidate: ^\n  latest/edge:      6.5 2023-01-10 (31) 20kB -\ninstalled:          6.4            (29) 20kB -\n";
        let record = parse_info(text).unwrap();
        assert_eq!(record.status, PackageStatus::Upgradable);
        assert_eq!(record.installed_version, "6.4");
        assert_eq!(record.available_version, "6.5");
        assert_eq!(record.extra["summary"], "The 'hello-world' of snaps");
    }

    #[test]
    fn info_not_installed() {
        let text = "name:      hello\nsummary:   GNU Hello\nchannels:\n  latest/stable:    2.10 2017-05-18 (38) 65kB -\n";
        let record = parse_info(text).unwrap();
        assert_eq!(record.status, PackageStatus::Available);
        assert_eq!(record.available_version, "2.10");
        assert!(parse_info("").is_none());
    }
}
