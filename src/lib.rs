//! # syspkg
//!
//! One typed interface over the system's native package managers (apt, yum,
//! apk, flatpak and snap). Adapters run the real tools through a
//! [`exec::CommandRunner`], classify each exit with a per-manager
//! classifier and parse the text output into [`core::types::PackageRecord`]s.
//!
//! ```rust,no_run
//! use syspkg::core::types::Options;
//! use syspkg::packages::default_registry;
//!
//! if let Ok(apt) = default_registry().get("apt") {
//!     for record in apt.status(&["bash".to_string()], &Options::default())? {
//!         println!("{record}");
//!     }
//! }
//! # Ok::<(), syspkg::error::SysPkgError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod exec;
pub mod packages;
pub mod parsers;
pub mod testing;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::ExitStatus;
use exec::CancelToken;
use std::process::exit;

/// Run the syspkg CLI entrypoint.
pub fn run_cli() {
    // 0. Colours follow the terminal until settings are read
    ui::init_colors("auto");

    // 1. Ctrl-C cancels the running invocation; the runner kills the child
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        ui::warning("Operation cancelled by user.");
        on_interrupt.cancel();
    }) {
        ui::warning(&format!("Could not install Ctrl-C handler: {}", e));
    }

    // 2. Parse & Run
    let args = cli::Cli::parse();
    ui::set_quiet(args.global.quiet);
    ui::set_verbose(args.global.verbose);

    let status = match cli::dispatcher::dispatch(&args, cancel) {
        Ok(status) => status,
        Err(e) => {
            ui::error(&e.to_string());
            if ui::is_verbose()
                && let Some(raw) = e.raw()
            {
                ui::indent(&raw.combined_text(), 1);
            }
            ExitStatus::from_error(&e)
        }
    };
    exit(status.code());
}
