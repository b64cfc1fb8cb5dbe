//! # Package Manager Registry
//!
//! Catalog of manager adapters keyed by name. Each entry carries a priority,
//! a category and a factory that builds a fresh adapter around the
//! registry's [`CommandRunner`].
//!
//! ## Access
//!
//! Registries are plain values: build one with [`Registry::with_defaults`]
//! (or [`Registry::new`] and your own registrations) and pass it where it is
//! needed. [`default_registry`] is a lazily built process-wide instance for
//! callers that do not care.
//!
//! ## Availability
//!
//! Availability is probed on every call (binary on PATH and answering
//! `--version`). Nothing is cached: containers gain and lose tools between
//! calls.
//!
//! ## Fan-out
//!
//! [`Registry::fan_out`] runs one operation on every available adapter in
//! parallel, on a rayon pool sized to the number of adapters so a hung tool
//! never queues the others behind it. Each worker is isolated: a failure, or even a panic,
//! becomes that adapter's entry in the [`FanOutReport`] and never reaches
//! the others.
//!
//! ```rust,no_run
//! use syspkg::core::types::{Operation, Options};
//! use syspkg::packages::Registry;
//! use syspkg::exec::SystemRunner;
//! use std::sync::Arc;
//!
//! let registry = Registry::with_defaults(Arc::new(SystemRunner::new()))?;
//! let report = registry.fan_out(&Operation::ListUpgradable, &Options::default())?;
//! for (manager, records) in report.successes() {
//!     println!("{manager}: {} upgradable", records.len());
//! }
//! # Ok::<(), syspkg::error::SysPkgError>(())
//! ```

use crate::config::Settings;
use crate::core::types::{ManagerCategory, Operation, Options, PackageRecord};
use crate::error::{Result, SysPkgError};
use crate::exec::{CommandRunner, SystemRunner};
use crate::packages::PackageManager;
use crate::packages::runtime::describe;
use crate::packages::{apk, apt, flatpak, snap, yum};
use crate::ui;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock, RwLock};

/// Builds a fresh adapter around the registry's runner.
pub type ManagerFactory =
    Arc<dyn Fn(Arc<dyn CommandRunner>) -> Box<dyn PackageManager> + Send + Sync>;

/// One registry entry. Immutable once registered.
#[derive(Clone)]
pub struct AdapterRegistration {
    name: String,
    category: ManagerCategory,
    priority: i32,
    factory: ManagerFactory,
}

impl AdapterRegistration {
    pub fn new<F>(name: &str, category: ManagerCategory, priority: i32, factory: F) -> Self
    where
        F: Fn(Arc<dyn CommandRunner>) -> Box<dyn PackageManager> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            category,
            priority,
            factory: Arc::new(factory),
        }
    }

    /// Same registration with another priority, for use before registering.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ManagerCategory {
        self.category
    }

    /// Higher wins in [`Registry::best_match`]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn instantiate(&self, runner: &Arc<dyn CommandRunner>) -> Box<dyn PackageManager> {
        (self.factory)(runner.clone())
    }
}

impl std::fmt::Debug for AdapterRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistration")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Built-in adapters with their default priorities.
pub fn default_registrations() -> Vec<AdapterRegistration> {
    vec![
        AdapterRegistration::new(apt::MANAGER, ManagerCategory::System, 90, |runner| {
            Box::new(apt::AptManager::new(runner))
        }),
        AdapterRegistration::new(yum::MANAGER, ManagerCategory::System, 85, |runner| {
            Box::new(yum::YumManager::new(runner))
        }),
        AdapterRegistration::new(apk::MANAGER, ManagerCategory::System, 80, |runner| {
            Box::new(apk::ApkManager::new(runner))
        }),
        AdapterRegistration::new(flatpak::MANAGER, ManagerCategory::App, 60, |runner| {
            Box::new(flatpak::FlatpakManager::new(runner))
        }),
        AdapterRegistration::new(snap::MANAGER, ManagerCategory::App, 50, |runner| {
            Box::new(snap::SnapManager::new(runner))
        }),
    ]
}

/// Thread-safe adapter catalog.
///
/// Reads (listing, probing, best match, fan-out) share the lock;
/// registration and removal take it exclusively. Workers run on a snapshot
/// of the catalog, so registering during a fan-out never waits for it.
pub struct Registry {
    runner: Arc<dyn CommandRunner>,
    entries: RwLock<BTreeMap<String, Arc<AdapterRegistration>>>,
}

impl Registry {
    /// Empty registry
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry with every built-in adapter.
    pub fn with_defaults(runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let registry = Self::new(runner);
        for registration in default_registrations() {
            registry.register(registration)?;
        }
        Ok(registry)
    }

    /// Built-in adapters minus `disable`d ones, with `priority` overrides.
    pub fn from_settings(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Result<Self> {
        let registry = Self::new(runner);
        let registrations = default_registrations();
        let named = settings
            .disabled
            .iter()
            .chain(settings.priorities.keys());
        for name in named {
            if !registrations.iter().any(|r| r.name() == name) {
                ui::warning(&format!("Settings name unknown manager '{}'", name));
            }
        }

        for registration in registrations {
            if settings.disabled.iter().any(|d| d == registration.name()) {
                ui::debug(&format!("{} disabled by settings", registration.name()));
                continue;
            }
            let registration = match settings.priorities.get(registration.name()) {
                Some(priority) => registration.with_priority(*priority),
                None => registration,
            };
            registry.register(registration)?;
        }
        Ok(registry)
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Add an adapter. Names are unique; re-registering requires
    /// [`Registry::unregister`] first.
    pub fn register(&self, registration: AdapterRegistration) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SysPkgError::LockError(e.to_string()))?;
        if entries.contains_key(registration.name()) {
            return Err(SysPkgError::DuplicateRegistration(registration.name.clone()));
        }
        entries.insert(registration.name.clone(), Arc::new(registration));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<Arc<AdapterRegistration>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SysPkgError::LockError(e.to_string()))?;
        entries
            .remove(name)
            .ok_or_else(|| SysPkgError::ManagerNotFound(name.to_string()))
    }

    /// Every registration, highest priority first.
    pub fn registrations(&self) -> Result<Vec<Arc<AdapterRegistration>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SysPkgError::LockError(e.to_string()))?;
        let mut registrations: Vec<_> = entries.values().cloned().collect();
        registrations.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
        Ok(registrations)
    }

    /// Registered names, highest priority first.
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self
            .registrations()?
            .iter()
            .map(|r| r.name.clone())
            .collect())
    }

    /// Fresh adapter for a registered name, available or not.
    pub fn get(&self, name: &str) -> Result<Box<dyn PackageManager>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SysPkgError::LockError(e.to_string()))?;
        entries
            .get(name)
            .map(|r| r.instantiate(&self.runner))
            .ok_or_else(|| SysPkgError::ManagerNotFound(name.to_string()))
    }

    /// Registered names per category, highest priority first within each.
    pub fn by_category(&self) -> Result<BTreeMap<ManagerCategory, Vec<String>>> {
        let mut grouped: BTreeMap<ManagerCategory, Vec<String>> = BTreeMap::new();
        for registration in self.registrations()? {
            grouped
                .entry(registration.category)
                .or_default()
                .push(registration.name.clone());
        }
        Ok(grouped)
    }

    /// Registrations whose probe succeeds right now, highest priority first.
    pub fn available(&self) -> Result<Vec<Arc<AdapterRegistration>>> {
        let registrations = self.registrations()?;
        let runner = &self.runner;
        let probed: Vec<(Arc<AdapterRegistration>, bool)> =
            on_own_workers(registrations.len(), || {
                registrations
                    .into_par_iter()
                    .with_max_len(1)
                    .map(|registration| {
                        let available = catch_unwind(AssertUnwindSafe(|| {
                            registration.instantiate(runner).is_available()
                        }))
                        .unwrap_or(false);
                        (registration, available)
                    })
                    .collect()
            });

        Ok(probed
            .into_iter()
            .filter_map(|(registration, available)| {
                ui::debug(&format!(
                    "{} {}",
                    registration.name,
                    if available { "available" } else { "unavailable" }
                ));
                available.then_some(registration)
            })
            .collect())
    }

    /// Names of the available adapters, highest priority first.
    pub fn available_names(&self) -> Result<Vec<String>> {
        Ok(self
            .available()?
            .iter()
            .map(|r| r.name.clone())
            .collect())
    }

    /// Highest-priority available adapter of `category`.
    pub fn best_match(&self, category: ManagerCategory) -> Result<Option<Box<dyn PackageManager>>> {
        Ok(self
            .available()?
            .into_iter()
            .find(|r| r.category == category)
            .map(|r| r.instantiate(&self.runner)))
    }

    /// Run `operation` on every available adapter concurrently.
    pub fn fan_out(&self, operation: &Operation, opts: &Options) -> Result<FanOutReport> {
        let targets = self.available()?;
        Ok(self.run_on(targets, operation, opts))
    }

    /// Run `operation` concurrently on the named adapters, skipping the
    /// availability probe.
    pub fn fan_out_to(
        &self,
        names: &[String],
        operation: &Operation,
        opts: &Options,
    ) -> Result<FanOutReport> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SysPkgError::LockError(e.to_string()))?;
        let targets = names
            .iter()
            .map(|name| {
                entries
                    .get(name)
                    .cloned()
                    .ok_or_else(|| SysPkgError::ManagerNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        drop(entries);
        Ok(self.run_on(targets, operation, opts))
    }

    fn run_on(
        &self,
        targets: Vec<Arc<AdapterRegistration>>,
        operation: &Operation,
        opts: &Options,
    ) -> FanOutReport {
        let label = describe(operation);
        let runner = &self.runner;
        let results: BTreeMap<String, Result<Vec<PackageRecord>>> =
            on_own_workers(targets.len(), || {
                targets
                    .par_iter()
                    .with_max_len(1)
                    .map(|registration| {
                        ui::debug(&format!("{}: {}", registration.name, label));
                        let outcome = catch_unwind(AssertUnwindSafe(|| {
                            registration.instantiate(runner).execute(operation, opts)
                        }))
                        .unwrap_or_else(|panic| {
                            Err(SysPkgError::Other(format!(
                                "{} adapter panicked: {}",
                                registration.name,
                                panic_message(panic.as_ref())
                            )))
                        });
                        (registration.name.clone(), outcome)
                    })
                    .collect()
            });
        FanOutReport { results }
    }
}

/// Run `work` on a pool with one thread per adapter. Adapter calls block on
/// child processes for up to their deadline.
fn on_own_workers<R, F>(width: usize, work: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if width <= 1 {
        return work();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(width)
        .thread_name(|i| format!("syspkg-fanout-{i}"))
        .build()
    {
        Ok(pool) => pool.install(work),
        Err(e) => {
            ui::warning(&format!("falling back to the shared pool: {e}"));
            work()
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Per-adapter results of one fan-out. Iteration order carries no meaning.
#[derive(Debug)]
pub struct FanOutReport {
    results: BTreeMap<String, Result<Vec<PackageRecord>>>,
}

impl FanOutReport {
    pub fn get(&self, manager: &str) -> Option<&Result<Vec<PackageRecord>>> {
        self.results.get(manager)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<Vec<PackageRecord>>)> {
        self.results.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &Vec<PackageRecord>)> {
        self.results
            .iter()
            .filter_map(|(name, result)| result.as_ref().ok().map(|r| (name.as_str(), r)))
    }

    /// Names of adapters that succeeded
    pub fn succeeded(&self) -> Vec<&str> {
        self.successes().map(|(name, _)| name).collect()
    }

    /// Adapters that failed, with their errors
    pub fn failed(&self) -> Vec<(&str, &SysPkgError)> {
        self.results
            .iter()
            .filter_map(|(name, result)| result.as_ref().err().map(|e| (name.as_str(), e)))
            .collect()
    }

    /// Some adapters failed and some succeeded
    pub fn is_partial_failure(&self) -> bool {
        let failed = self.failed().len();
        failed > 0 && failed < self.results.len()
    }

    /// Every adapter failed (false when there were none)
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.failed().len() == self.results.len()
    }

    /// All successful records, in manager-name order.
    pub fn records(&self) -> Vec<&PackageRecord> {
        self.successes().flat_map(|(_, records)| records.iter()).collect()
    }

    pub fn into_results(self) -> BTreeMap<String, Result<Vec<PackageRecord>>> {
        self.results
    }
}

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Process-wide registry over the real system, built on first use.
///
/// Falls back to an empty registry if the built-in set cannot be
/// registered, which only happens on a poisoned lock.
pub fn default_registry() -> &'static Registry {
    DEFAULT_REGISTRY.get_or_init(|| {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
        Registry::with_defaults(runner.clone()).unwrap_or_else(|e| {
            ui::warning(&format!("Could not register built-in managers: {e}"));
            Registry::new(runner)
        })
    })
}
