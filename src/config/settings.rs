//! Settings file
//!
//! ```kdl
//! timeout 300
//! color "never"
//! assume-yes #true
//! disable "snap"
//! priority "apk" 95
//! env {
//!     http_proxy "http://proxy:3128"
//! }
//! ```
//!
//! Unknown nodes are reported and skipped; a known node with a bad value is
//! an error.

use crate::error::{Result, SysPkgError};
use crate::exec::DEFAULT_TIMEOUT;
use crate::ui;
use crate::utils::paths;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const COLOR_POLICIES: &[&str] = &["auto", "always", "never"];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Deadline for each external invocation
    pub timeout: Duration,
    /// One of [`COLOR_POLICIES`]
    pub color: String,
    /// Default for mutating commands when `--yes` is not given
    pub assume_yes: bool,
    /// Managers never registered
    pub disabled: Vec<String>,
    /// Priority overrides by manager name
    pub priorities: BTreeMap<String, i32>,
    /// Extra environment for every invocation
    pub env: Vec<(String, String)>,
    /// File the settings came from, if any
    pub source: Option<PathBuf>,
    /// Problems that did not stop parsing (unknown nodes)
    pub warnings: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            color: "auto".to_string(),
            assume_yes: false,
            disabled: Vec::new(),
            priorities: BTreeMap::new(),
            env: Vec::new(),
            source: None,
            warnings: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from `explicit`, `SYSPKG_CONFIG` or the default location.
    /// Defaults when no file exists at the default location.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match paths::resolve_settings_file(explicit)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut settings = Self::parse(&content).map_err(|e| match e {
            SysPkgError::ConfigError(msg) => {
                SysPkgError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        settings.source = Some(path.to_path_buf());
        for warning in &settings.warnings {
            ui::warning(&format!("{}: {}", path.display(), warning));
        }
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let doc: KdlDocument = content.parse()?;
        let mut settings = Self::default();

        for node in doc.nodes() {
            match node.name().value() {
                "timeout" => {
                    let secs = integer_arg(node, 0)?;
                    if secs <= 0 {
                        return Err(bad_value(node, "expects a positive number of seconds"));
                    }
                    settings.timeout = Duration::from_secs(secs as u64);
                }
                "color" => {
                    let policy = string_arg(node, 0)?;
                    if !COLOR_POLICIES.contains(&policy) {
                        return Err(bad_value(
                            node,
                            &format!("expects one of: {}", COLOR_POLICIES.join(", ")),
                        ));
                    }
                    settings.color = policy.to_string();
                }
                "assume-yes" => {
                    settings.assume_yes = match node.entries().first().map(|e| e.value()) {
                        None => true,
                        Some(KdlValue::Bool(b)) => *b,
                        Some(_) => return Err(bad_value(node, "expects #true or #false")),
                    };
                }
                "disable" => {
                    if node.entries().is_empty() {
                        return Err(bad_value(node, "expects at least one manager name"));
                    }
                    for index in 0..node.entries().len() {
                        let name = string_arg(node, index)?.to_string();
                        if !settings.disabled.contains(&name) {
                            settings.disabled.push(name);
                        }
                    }
                }
                "priority" => {
                    let name = string_arg(node, 0)?.to_string();
                    let value = i32::try_from(integer_arg(node, 1)?)
                        .map_err(|_| bad_value(node, "priority is out of range"))?;
                    settings.priorities.insert(name, value);
                }
                "env" => {
                    let Some(children) = node.children() else {
                        return Err(bad_value(node, "expects a block of KEY \"value\" nodes"));
                    };
                    for var in children.nodes() {
                        let value = string_arg(var, 0)?.to_string();
                        let key = var.name().value().to_string();
                        settings.env.retain(|(k, _)| *k != key);
                        settings.env.push((key, value));
                    }
                }
                other => settings
                    .warnings
                    .push(format!("unknown setting '{}' ignored", other)),
            }
        }

        Ok(settings)
    }
}

fn bad_value(node: &KdlNode, problem: &str) -> SysPkgError {
    SysPkgError::ConfigError(format!("'{}' {}", node.name().value(), problem))
}

fn string_arg(node: &KdlNode, index: usize) -> Result<&str> {
    node.entries()
        .get(index)
        .filter(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| bad_value(node, &format!("expects a string at position {}", index + 1)))
}

fn integer_arg(node: &KdlNode, index: usize) -> Result<i128> {
    node.entries()
        .get(index)
        .filter(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| bad_value(node, &format!("expects a number at position {}", index + 1)))
}
