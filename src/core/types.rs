use crate::exec::RunControl;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Extra-metadata key set on records produced by a dry run.
pub const PLANNED_ACTION: &str = "planned_action";

// Normalized state of one package as reported by one manager.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Installed,
    Upgradable,
    Available,
    Unknown,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::Upgradable => write!(f, "upgradable"),
            Self::Available => write!(f, "available"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One package's state as reported by one manager at one instant.
///
/// Records are snapshots: built by a parser, handed to the caller, never
/// persisted. The constructors keep the status/version invariants; the
/// `with_*` builders only fill descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub installed_version: String,
    pub available_version: String,
    pub status: PackageStatus,
    pub category: String,
    pub arch: String,
    pub manager: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub extra: BTreeMap<String, String>,
}

impl PackageRecord {
    fn bare(name: &str, manager: &str, status: PackageStatus) -> Self {
        Self {
            name: name.to_string(),
            installed_version: String::new(),
            available_version: String::new(),
            status,
            category: String::new(),
            arch: String::new(),
            manager: manager.to_string(),
            extra: BTreeMap::new(),
        }
    }

    pub fn installed(name: &str, version: &str, manager: &str) -> Self {
        let mut record = Self::bare(name, manager, PackageStatus::Installed);
        record.installed_version = version.to_string();
        record
    }

    pub fn available(name: &str, version: &str, manager: &str) -> Self {
        let mut record = Self::bare(name, manager, PackageStatus::Available);
        record.available_version = version.to_string();
        record
    }

    /// Installed package with a candidate version.
    ///
    /// Collapses to `Installed` when the candidate is missing or equal to the
    /// installed version, and to `Available` when nothing is installed.
    pub fn upgradable(name: &str, installed: &str, candidate: &str, manager: &str) -> Self {
        let status = if installed.is_empty() {
            PackageStatus::Available
        } else if candidate.is_empty() || candidate == installed {
            PackageStatus::Installed
        } else {
            PackageStatus::Upgradable
        };
        let mut record = Self::bare(name, manager, status);
        record.installed_version = installed.to_string();
        record.available_version = candidate.to_string();
        record
    }

    pub fn unknown(name: &str, manager: &str) -> Self {
        Self::bare(name, manager, PackageStatus::Unknown)
    }

    pub fn with_arch(mut self, arch: &str) -> Self {
        self.arch = arch.to_string();
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Tag a record produced by a dry run with the action that would happen.
    pub fn planned(self, action: PlannedAction) -> Self {
        self.with_extra(PLANNED_ACTION, action.as_str())
    }

    pub fn planned_action(&self) -> Option<&str> {
        self.extra.get(PLANNED_ACTION).map(String::as_str)
    }

    /// Version worth showing to a human: installed first, then candidate.
    pub fn display_version(&self) -> &str {
        if self.installed_version.is_empty() {
            &self.available_version
        } else {
            &self.installed_version
        }
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.name, self.display_version(), self.status)?;
        if self.status == PackageStatus::Upgradable {
            write!(f, " -> {}", self.available_version)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    WouldInstall,
    WouldRemove,
    WouldUpgrade,
}

impl PlannedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WouldInstall => "would-install",
            Self::WouldRemove => "would-remove",
            Self::WouldUpgrade => "would-upgrade",
        }
    }
}

/// Make sure every queried name shows up in the result.
///
/// Names the manager stayed silent about are reported as `Unknown` instead
/// of being dropped.
pub fn fill_unknown(mut records: Vec<PackageRecord>, queried: &[String], manager: &str) -> Vec<PackageRecord> {
    for name in queried {
        if !records.iter().any(|r| &r.name == name) {
            records.push(PackageRecord::unknown(name, manager));
        }
    }
    records
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerCategory {
    System,
    App,
    Language,
}

impl fmt::Display for ManagerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::App => write!(f, "app"),
            Self::Language => write!(f, "language"),
        }
    }
}

impl std::str::FromStr for ManagerCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "app" => Ok(Self::App),
            "language" => Ok(Self::Language),
            other => Err(format!("unknown manager category '{}'", other)),
        }
    }
}

/// Operation identity without its arguments. Used by classifiers and errors.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Search,
    ListInstalled,
    ListUpgradable,
    Install,
    Remove,
    Refresh,
    Upgrade,
    Clean,
    Autoremove,
    Verify,
    GetInfo,
    Status,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::ListInstalled => "list-installed",
            Self::ListUpgradable => "list-upgradable",
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Refresh => "refresh",
            Self::Upgrade => "upgrade",
            Self::Clean => "clean",
            Self::Autoremove => "autoremove",
            Self::Verify => "verify",
            Self::GetInfo => "get-info",
            Self::Status => "status",
        }
    }

    /// Operations that change system state and may run interactively.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Install
                | Self::Remove
                | Self::Refresh
                | Self::Upgrade
                | Self::Clean
                | Self::Autoremove
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation together with its caller-supplied names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Search(Vec<String>),
    ListInstalled,
    ListUpgradable,
    Install(Vec<String>),
    Remove(Vec<String>),
    Refresh,
    /// Empty list upgrades everything.
    Upgrade(Vec<String>),
    Clean,
    Autoremove,
    Verify(Vec<String>),
    GetInfo(String),
    Status(Vec<String>),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Search(_) => OperationKind::Search,
            Self::ListInstalled => OperationKind::ListInstalled,
            Self::ListUpgradable => OperationKind::ListUpgradable,
            Self::Install(_) => OperationKind::Install,
            Self::Remove(_) => OperationKind::Remove,
            Self::Refresh => OperationKind::Refresh,
            Self::Upgrade(_) => OperationKind::Upgrade,
            Self::Clean => OperationKind::Clean,
            Self::Autoremove => OperationKind::Autoremove,
            Self::Verify(_) => OperationKind::Verify,
            Self::GetInfo(_) => OperationKind::GetInfo,
            Self::Status(_) => OperationKind::Status,
        }
    }
}

/// Caller options shared by every adapter method.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Simulate mutating operations
    pub dry_run: bool,
    /// Answer yes to the tool's own prompts
    pub assume_yes: bool,
    pub verbose: bool,
    /// Hand the terminal to the tool for mutating operations (no parsing)
    pub interactive: bool,
    /// Deadline and cancellation for every invocation
    pub control: RunControl,
}

impl Options {
    pub fn assume_yes() -> Self {
        Self {
            assume_yes: true,
            ..Default::default()
        }
    }

    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgradable_collapses_when_versions_match() {
        let same = PackageRecord::upgradable("curl", "8.5.0", "8.5.0", "apk");
        assert_eq!(same.status, PackageStatus::Installed);

        let newer = PackageRecord::upgradable("curl", "8.4.0", "8.5.0", "apk");
        assert_eq!(newer.status, PackageStatus::Upgradable);
        assert_eq!(newer.installed_version, "8.4.0");
        assert_eq!(newer.available_version, "8.5.0");

        let absent = PackageRecord::upgradable("curl", "", "8.5.0", "apk");
        assert_eq!(absent.status, PackageStatus::Available);
    }

    #[test]
    fn fill_unknown_keeps_existing_and_appends_missing() {
        let records = vec![PackageRecord::installed("bash", "5.1", "apt")];
        let queried = vec!["bash".to_string(), "byobu".to_string()];
        let filled = fill_unknown(records, &queried, "apt");

        assert_eq!(filled.len(), 2);
        assert_eq!(filled[1].name, "byobu");
        assert_eq!(filled[1].status, PackageStatus::Unknown);
        assert!(filled[1].installed_version.is_empty());
    }

    #[test]
    fn record_serializes_status_lowercase() {
        let record = PackageRecord::installed("vim", "9.0", "apk").with_arch("x86_64");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"installed\""));
        assert!(!json.contains("extra"));
    }

    #[test]
    fn planned_action_roundtrip() {
        let record = PackageRecord::available("hello", "2.10", "snap").planned(PlannedAction::WouldInstall);
        assert_eq!(record.planned_action(), Some("would-install"));
    }

    #[test]
    fn only_state_changing_operations_are_mutating() {
        assert!(OperationKind::Install.is_mutating());
        assert!(OperationKind::Refresh.is_mutating());
        assert!(!OperationKind::Search.is_mutating());
        assert!(!OperationKind::Verify.is_mutating());
        assert_eq!(Operation::Upgrade(vec![]).kind(), OperationKind::Upgrade);
    }
}
