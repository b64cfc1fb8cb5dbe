use crate::core::types::Operation;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "syspkg",
    about = "One interface to apt, yum, apk, flatpak and snap",
    long_about = "Drive the system's native package managers through one set of commands.\n\
                  Without --manager or --all, the highest-priority available system manager is used.",
    version,
    next_line_help = false,
    term_width = 80
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser, Debug)]
pub struct GlobalFlags {
    /// Verbose output (trace every invocation)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Answer yes to the package manager's prompts
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Preview changes without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Hand the terminal to the package manager for mutating commands
    #[arg(long, global = true, conflicts_with = "json")]
    pub interactive: bool,

    /// Print records as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (default: platform config dir, or $SYSPKG_CONFIG)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Use one manager by name (apt, yum, apk, flatpak, snap)
    #[arg(short = 'm', long, value_name = "NAME", global = true, conflicts_with = "all")]
    pub manager: Option<String>,

    /// Run on every available manager
    #[arg(short = 'a', long, global = true)]
    pub all: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered managers and whether they are available
    Managers,

    /// Search packages by keyword
    Search {
        #[arg(required = true)]
        keywords: Vec<String>,
    },

    /// List installed packages
    List {
        /// Only packages with a newer version available
        #[arg(short = 'u', long)]
        upgradable: bool,
    },

    /// Install packages
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Remove packages
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Refresh package metadata
    Refresh,

    /// Upgrade the named packages, or everything
    Upgrade { packages: Vec<String> },

    /// Clean the download cache
    Clean,

    /// Remove packages nothing depends on anymore
    Autoremove,

    /// Check installed files against the package database
    Verify {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Show details for one package
    Info { package: String },

    /// Show the state of each named package
    Status {
        #[arg(required = true)]
        packages: Vec<String>,
    },
}

impl Command {
    /// Operation to run, or `None` for commands that only inspect the registry.
    pub fn operation(&self) -> Option<Operation> {
        let op = match self {
            Self::Managers => return None,
            Self::Search { keywords } => Operation::Search(keywords.clone()),
            Self::List { upgradable: false } => Operation::ListInstalled,
            Self::List { upgradable: true } => Operation::ListUpgradable,
            Self::Install { packages } => Operation::Install(packages.clone()),
            Self::Remove { packages } => Operation::Remove(packages.clone()),
            Self::Refresh => Operation::Refresh,
            Self::Upgrade { packages } => Operation::Upgrade(packages.clone()),
            Self::Clean => Operation::Clean,
            Self::Autoremove => Operation::Autoremove,
            Self::Verify { packages } => Operation::Verify(packages.clone()),
            Self::Info { package } => Operation::GetInfo(package.clone()),
            Self::Status { packages } => Operation::Status(packages.clone()),
        };
        Some(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["syspkg", "install", "vim", "--dry-run", "-y", "-m", "apt"])
            .unwrap();
        assert!(cli.global.dry_run);
        assert!(cli.global.yes);
        assert_eq!(cli.global.manager.as_deref(), Some("apt"));
        assert_eq!(
            cli.command.operation(),
            Some(Operation::Install(vec!["vim".to_string()]))
        );
    }

    #[test]
    fn manager_and_all_conflict() {
        assert!(Cli::try_parse_from(["syspkg", "--all", "--manager", "apt", "refresh"]).is_err());
    }

    #[test]
    fn names_are_required_where_it_matters() {
        assert!(Cli::try_parse_from(["syspkg", "install"]).is_err());
        assert!(Cli::try_parse_from(["syspkg", "verify"]).is_err());
        let upgrade = Cli::try_parse_from(["syspkg", "upgrade"]).unwrap();
        assert_eq!(upgrade.command.operation(), Some(Operation::Upgrade(Vec::new())));
    }

    #[test]
    fn list_upgradable_maps_to_its_operation() {
        let cli = Cli::try_parse_from(["syspkg", "list", "--upgradable"]).unwrap();
        assert_eq!(cli.command.operation(), Some(Operation::ListUpgradable));
        let cli = Cli::try_parse_from(["syspkg", "managers"]).unwrap();
        assert_eq!(cli.command.operation(), None);
    }
}
