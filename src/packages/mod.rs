//! # Package Manager Adapters
//!
//! One adapter per native package manager, all behind the
//! [`PackageManager`] trait:
//!
//! - **apt** (`apt/`): Debian and Ubuntu, with dpkg for local state
//! - **yum** (`yum/`): Fedora, RHEL and derivatives, with rpm for local state
//! - **apk** (`apk/`): Alpine Linux
//! - **flatpak** (`flatpak/`): desktop applications from a remote
//! - **snap** (`snap/`): snapd applications
//!
//! Every adapter is a thin layer over [`runtime::ManagerRuntime`]: build the
//! argument vector, run it through the shared runner, let the adapter's
//! classifier judge the exit, then hand the text to the adapter's pure
//! parsers.
//!
//! ## Registry
//!
//! [`Registry`] holds adapter factories keyed by name, probes availability
//! on demand and fans one operation out to every available adapter.
//!
//! ```rust,no_run
//! use syspkg::core::types::{ManagerCategory, Options};
//! use syspkg::packages::default_registry;
//!
//! if let Some(manager) = default_registry().best_match(ManagerCategory::System)? {
//!     let installed = manager.list_installed(&Options::default())?;
//!     println!("{}: {} packages", manager.name(), installed.len());
//! }
//! # Ok::<(), syspkg::error::SysPkgError>(())
//! ```

pub mod apk;
pub mod apt;
pub mod flatpak;
pub mod registry;
pub mod runtime;
pub mod snap;
pub mod traits;
pub mod yum;

pub use registry::{AdapterRegistration, FanOutReport, Registry, default_registry};
pub use traits::PackageManager;
