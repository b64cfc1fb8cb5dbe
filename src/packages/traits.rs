use crate::core::types::{ManagerCategory, Operation, Options, PackageRecord};
use crate::error::Result;
use crate::utils::sanitize::validate_package_names;

/// One package manager behind the normalized operation contract.
///
/// Every method validates its names, runs the tool, lets the manager's
/// classifier judge the exit, and parses on success. Operations a manager
/// has no concept of keep the default implementation: an empty success.
pub trait PackageManager: Send + Sync {
    /// Registry key, e.g. "apt"
    fn name(&self) -> &'static str;

    /// Primary binary probed for availability
    fn binary(&self) -> &'static str;

    fn category(&self) -> ManagerCategory;

    /// Binary on PATH and answering a version query
    fn is_available(&self) -> bool;

    fn search(&self, keywords: &[String], opts: &Options) -> Result<Vec<PackageRecord>>;

    fn list_installed(&self, opts: &Options) -> Result<Vec<PackageRecord>>;

    fn list_upgradable(&self, opts: &Options) -> Result<Vec<PackageRecord>>;

    fn install(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>>;

    fn remove(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>>;

    /// Refresh package metadata (apt update, yum makecache)
    fn refresh(&self, _opts: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }

    /// Upgrade the named packages, or everything when `names` is empty
    fn upgrade(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>>;

    /// Clean the download cache
    fn clean(&self, _opts: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }

    /// Remove packages nothing depends on anymore
    fn autoremove(&self, _opts: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }

    /// Check installed files against the package database. Names are
    /// still validated where there is nothing to check.
    fn verify(&self, names: &[String], _opts: &Options) -> Result<Vec<PackageRecord>> {
        validate_package_names(names)?;
        Ok(Vec::new())
    }

    fn get_info(&self, name: &str, opts: &Options) -> Result<PackageRecord>;

    /// Current state of each name. Names the manager does not know come back
    /// as `Unknown`.
    fn status(&self, names: &[String], opts: &Options) -> Result<Vec<PackageRecord>>;

    /// Dispatch an [`Operation`] to the matching method.
    fn execute(&self, operation: &Operation, opts: &Options) -> Result<Vec<PackageRecord>> {
        match operation {
            Operation::Search(keywords) => self.search(keywords, opts),
            Operation::ListInstalled => self.list_installed(opts),
            Operation::ListUpgradable => self.list_upgradable(opts),
            Operation::Install(names) => self.install(names, opts),
            Operation::Remove(names) => self.remove(names, opts),
            Operation::Refresh => self.refresh(opts),
            Operation::Upgrade(names) => self.upgrade(names, opts),
            Operation::Clean => self.clean(opts),
            Operation::Autoremove => self.autoremove(opts),
            Operation::Verify(names) => self.verify(names, opts),
            Operation::GetInfo(name) => self.get_info(name, opts).map(|r| vec![r]),
            Operation::Status(names) => self.status(names, opts),
        }
    }
}
