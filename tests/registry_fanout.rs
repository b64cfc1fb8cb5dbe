use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use syspkg::core::outcome::OutcomeKind;
use syspkg::core::types::{ManagerCategory, Operation, Options, PackageRecord};
use syspkg::error::{Result, SysPkgError};
use syspkg::exec::ExecutionResult;
use syspkg::packages::{AdapterRegistration, PackageManager, Registry};
use syspkg::testing::MockRunner;

/// Adapter whose listing always panics.
struct Exploding;

impl PackageManager for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }
    fn binary(&self) -> &'static str {
        "exploding"
    }
    fn category(&self) -> ManagerCategory {
        ManagerCategory::Language
    }
    fn is_available(&self) -> bool {
        true
    }
    fn search(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn list_installed(&self, _: &Options) -> Result<Vec<PackageRecord>> {
        panic!("index out of bounds")
    }
    fn list_upgradable(&self, _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn install(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn remove(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn upgrade(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn get_info(&self, name: &str, _: &Options) -> Result<PackageRecord> {
        Ok(PackageRecord::unknown(name, "exploding"))
    }
    fn status(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
}

/// Adapter whose listing blocks like a tool waiting on a lock.
struct Stalled {
    name: &'static str,
    stall: Duration,
}

impl PackageManager for Stalled {
    fn name(&self) -> &'static str {
        self.name
    }
    fn binary(&self) -> &'static str {
        self.name
    }
    fn category(&self) -> ManagerCategory {
        ManagerCategory::Language
    }
    fn is_available(&self) -> bool {
        true
    }
    fn search(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn list_installed(&self, _: &Options) -> Result<Vec<PackageRecord>> {
        thread::sleep(self.stall);
        Ok(vec![PackageRecord::installed("bash", "5.2", self.name)])
    }
    fn list_upgradable(&self, _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn install(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn remove(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn upgrade(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
    fn get_info(&self, name: &str, _: &Options) -> Result<PackageRecord> {
        Ok(PackageRecord::unknown(name, self.name))
    }
    fn status(&self, _: &[String], _: &Options) -> Result<Vec<PackageRecord>> {
        Ok(Vec::new())
    }
}

#[test]
fn one_adapter_failing_or_panicking_leaves_the_others_intact() {
    let mock = Arc::new(MockRunner::new().with_binary("apk").with_binary("snap"));
    mock.respond(
        "apk list --installed",
        ExecutionResult::new(0, "musl-1.2.4-r2 x86_64 {musl} (MIT) [installed]\n", ""),
    );
    mock.respond(
        "snap list",
        ExecutionResult::new(1, "", "error: cannot communicate with server: connection refused\n"),
    );

    let registry = Registry::with_defaults(mock.clone()).unwrap();
    registry
        .register(AdapterRegistration::new(
            "exploding",
            ManagerCategory::Language,
            10,
            |_| Box::new(Exploding),
        ))
        .unwrap();

    let report = registry
        .fan_out(&Operation::ListInstalled, &Options::default())
        .unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report.succeeded(), vec!["apk"]);
    assert!(report.is_partial_failure());

    let apk = report.get("apk").unwrap().as_ref().unwrap();
    assert_eq!(apk[0].name, "musl");

    let snap = report.get("snap").unwrap().as_ref().unwrap_err();
    assert_eq!(snap.kind(), OutcomeKind::GeneralError);

    let exploding = report.get("exploding").unwrap().as_ref().unwrap_err();
    assert!(matches!(exploding, SysPkgError::Other(msg) if msg.contains("index out of bounds")));
}

#[test]
fn every_adapter_failing_is_all_failed() {
    let mock = Arc::new(MockRunner::new().with_binary("apk"));
    mock.respond("apk update", ExecutionResult::new(2, "", "ERROR: network error\n"));
    let registry = Registry::with_defaults(mock).unwrap();
    let report = registry.fan_out(&Operation::Refresh, &Options::default()).unwrap();
    assert!(report.all_failed());
    assert!(!report.is_partial_failure());
}

#[test]
fn availability_is_probed_on_every_call() {
    let mock = Arc::new(MockRunner::new());
    let registry = Registry::with_defaults(mock.clone()).unwrap();
    assert!(registry.available_names().unwrap().is_empty());

    mock.respond("yum --version", ExecutionResult::new(0, "4.14.0\n", ""));
    assert_eq!(registry.available_names().unwrap(), vec!["yum"]);
    let best = registry.best_match(ManagerCategory::System).unwrap().unwrap();
    assert_eq!(best.name(), "yum");
}

#[test]
fn hostile_names_never_reach_the_runner() {
    let mock = Arc::new(MockRunner::new());
    let registry = Registry::with_defaults(mock.clone()).unwrap();

    let hostile = vec!["vim; rm -rf /".to_string()];
    let operations = [
        Operation::Install(hostile.clone()),
        Operation::Remove(hostile.clone()),
        Operation::Upgrade(hostile.clone()),
        Operation::Search(hostile.clone()),
        Operation::Status(hostile.clone()),
        Operation::Verify(hostile.clone()),
        Operation::GetInfo("--config=/tmp/evil".to_string()),
        Operation::Install(Vec::new()),
        Operation::Verify(Vec::new()),
    ];

    for name in registry.names().unwrap() {
        let manager = registry.get(&name).unwrap();
        for operation in &operations {
            let err = manager
                .execute(operation, &Options::assume_yes())
                .unwrap_err();
            assert!(
                matches!(err, SysPkgError::Validation(_)),
                "{name} {operation:?}: {err}"
            );
        }
    }
    assert!(mock.calls().is_empty());
}

#[test]
fn get_info_of_unknown_name_is_not_found() {
    let mock = Arc::new(MockRunner::new());
    mock.respond("apk list nope", ExecutionResult::new(0, "", ""));
    let registry = Registry::with_defaults(mock).unwrap();
    let err = registry
        .get("apk")
        .unwrap()
        .get_info("nope", &Options::default())
        .unwrap_err();
    assert_eq!(err.kind(), OutcomeKind::NotFound);
}

#[test]
fn slow_adapters_run_side_by_side() {
    let registry = Registry::new(Arc::new(MockRunner::new()));
    let names = ["s1", "s2", "s3", "s4", "s5", "s6"];
    for name in names {
        registry
            .register(AdapterRegistration::new(
                name,
                ManagerCategory::Language,
                10,
                move |_| {
                    Box::new(Stalled {
                        name,
                        stall: Duration::from_millis(1500),
                    })
                },
            ))
            .unwrap();
    }

    let started = Instant::now();
    let report = registry
        .fan_out(&Operation::ListInstalled, &Options::default())
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.succeeded().len(), names.len());
    assert!(elapsed < Duration::from_secs(4), "fan-out took {elapsed:?}");
}
