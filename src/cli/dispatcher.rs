//! Command dispatcher
//!
//! Builds the registry and options from settings and flags, picks the
//! target manager(s), runs the operation and renders the result.

use super::ExitStatus;
use crate::cli::args::Cli;
use crate::config::Settings;
use crate::core::types::{ManagerCategory, Operation, Options, PackageRecord, PackageStatus};
use crate::error::{Result, SysPkgError};
use crate::exec::{CancelToken, CommandRunner, RunControl, SystemRunner};
use crate::packages::{FanOutReport, Registry};
use crate::ui as output;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct ManagerOut {
    name: String,
    category: ManagerCategory,
    priority: i32,
    available: bool,
}

#[derive(Debug, Serialize)]
struct FailureOut {
    kind: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ManagerResultOut<'a> {
    Records { records: &'a [PackageRecord] },
    Failure { error: FailureOut },
}

/// Dispatch the parsed CLI command against the real system.
pub fn dispatch(args: &Cli, cancel: CancelToken) -> Result<ExitStatus> {
    let settings = Settings::load(args.global.config.as_deref())?;
    output::init_colors(&settings.color);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::with_env(settings.env.clone()));
    let registry = Registry::from_settings(runner, &settings)?;
    dispatch_with(args, &registry, &settings, cancel)
}

/// Dispatch against a prepared registry.
pub fn dispatch_with(
    args: &Cli,
    registry: &Registry,
    settings: &Settings,
    cancel: CancelToken,
) -> Result<ExitStatus> {
    let Some(operation) = args.command.operation() else {
        return show_managers(args, registry);
    };

    let opts = Options {
        dry_run: args.global.dry_run,
        assume_yes: args.global.yes || settings.assume_yes,
        verbose: args.global.verbose,
        interactive: args.global.interactive,
        control: RunControl {
            timeout: settings.timeout,
            cancel,
        },
    };

    if args.global.all {
        let report = registry.fan_out(&operation, &opts)?;
        return render_report(args, &report);
    }

    let manager = match &args.global.manager {
        Some(name) => registry.get(name)?,
        None => registry
            .best_match(ManagerCategory::System)?
            .ok_or_else(|| {
                SysPkgError::ManagerNotFound("no system package manager available".to_string())
            })?,
    };
    output::debug(&format!("using {}", manager.name()));

    let records = manager.execute(&operation, &opts)?;
    render_records(args, &operation, &records)?;
    Ok(ExitStatus::Success)
}

fn show_managers(args: &Cli, registry: &Registry) -> Result<ExitStatus> {
    let available = registry.available_names()?;
    let managers: Vec<ManagerOut> = registry
        .registrations()?
        .iter()
        .map(|r| ManagerOut {
            name: r.name().to_string(),
            category: r.category(),
            priority: r.priority(),
            available: available.iter().any(|a| a == r.name()),
        })
        .collect();

    if args.global.json {
        println!("{}", serde_json::to_string_pretty(&managers)?);
        return Ok(ExitStatus::Success);
    }

    output::header("Package managers");
    for m in &managers {
        let state = if m.available {
            "available".green()
        } else {
            "not found".bright_black()
        };
        println!(
            "  {:<10} {:<8} {:>4}  {}",
            m.name.bold(),
            m.category.to_string(),
            m.priority,
            state
        );
    }
    Ok(ExitStatus::Success)
}

fn render_records(args: &Cli, operation: &Operation, records: &[PackageRecord]) -> Result<()> {
    if args.global.json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if let Operation::GetInfo(_) = operation {
        records.iter().for_each(print_details);
        return Ok(());
    }

    if records.is_empty() {
        if !operation.kind().is_mutating() || args.global.dry_run {
            output::info("Nothing to report");
        } else {
            output::success("Done");
        }
        return Ok(());
    }

    for record in records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &PackageRecord) {
    let status = match record.status {
        PackageStatus::Installed => record.status.to_string().green(),
        PackageStatus::Upgradable => record.status.to_string().yellow(),
        PackageStatus::Available => record.status.to_string().blue(),
        PackageStatus::Unknown => record.status.to_string().bright_black(),
    };
    let mut line = format!("{} {} {}", record.name.bold(), record.display_version(), status);
    if record.status == PackageStatus::Upgradable {
        line.push_str(&format!(" -> {}", record.available_version));
    }
    if let Some(action) = record.planned_action() {
        line.push_str(&format!(" ({})", action.cyan()));
    }
    if let Some(summary) = record.extra.get("summary") {
        line.push_str(&format!("  {}", summary.bright_black()));
    }
    println!("{}", line);
}

fn print_details(record: &PackageRecord) {
    output::keyval("Name", &record.name);
    output::keyval("Status", &record.status.to_string());
    for (key, value) in [
        ("Installed", &record.installed_version),
        ("Candidate", &record.available_version),
        ("Arch", &record.arch),
        ("Section", &record.category),
    ] {
        if !value.is_empty() {
            output::keyval(key, value);
        }
    }
    output::keyval("Manager", &record.manager);
    for (key, value) in &record.extra {
        output::keyval(key, value);
    }
}

fn render_report(args: &Cli, report: &FanOutReport) -> Result<ExitStatus> {
    if report.is_empty() {
        return Err(SysPkgError::ManagerNotFound(
            "no package manager available".to_string(),
        ));
    }

    if args.global.json {
        let out: BTreeMap<&str, ManagerResultOut> = report
            .iter()
            .map(|(name, result)| {
                let entry = match result {
                    Ok(records) => ManagerResultOut::Records { records },
                    Err(e) => ManagerResultOut::Failure {
                        error: FailureOut {
                            kind: e.kind().to_string(),
                            message: e.to_string(),
                        },
                    },
                };
                (name, entry)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for (i, (name, result)) in report.iter().enumerate() {
            if i > 0 {
                output::separator();
            }
            output::header(name);
            match result {
                Ok(records) if records.is_empty() => output::indent("(none)", 1),
                Ok(records) => records.iter().for_each(print_record),
                Err(e) => output::error(&e.to_string()),
            }
        }
    }

    Ok(report_status(report))
}

/// Exit status of a fan-out
pub fn report_status(report: &FanOutReport) -> ExitStatus {
    if report.all_failed() {
        ExitStatus::Failure
    } else if report.is_partial_failure() {
        ExitStatus::PartialFailure
    } else {
        ExitStatus::Success
    }
}
