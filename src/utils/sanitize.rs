//! Input validation for package names and search keywords
//!
//! Every caller-supplied name passes through here before an adapter builds
//! an argument vector. Arguments never reach a shell, but a hostile name can
//! still smuggle an option (`--config=...`) or garbage into the tool, so the
//! allow-list is strict.

use crate::error::{Result, SysPkgError};
use regex::Regex;
use std::sync::LazyLock;

const MAX_NAME_LEN: usize = 256;

/// Safe characters for package identifiers across supported managers.
/// Allows: alphanumeric, dot, dash, underscore, plus, colon, tilde, equals
/// (`pkg:amd64`, `pkg=1.2-3`, `1.0~rc1`)
static SAFE_PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._+:~=-]+$").expect("Invalid regex pattern"));

/// Characters that could be dangerous in shell contexts
static SHELL_DANGEROUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[;`$(){}|&<>\\'"\s*?!#]"#).expect("Invalid regex pattern"));

/// Validate a single package name or keyword.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SysPkgError::Validation(
            "Package name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LEN {
        let preview: String = name.chars().take(50).collect();
        return Err(SysPkgError::Validation(format!(
            "Package name too long (max {} chars): {}...",
            MAX_NAME_LEN, preview
        )));
    }

    if SHELL_DANGEROUS.is_match(name) {
        return Err(SysPkgError::Validation(format!(
            "Package name contains shell metacharacters: {:?}",
            name
        )));
    }

    if !SAFE_PACKAGE_NAME.is_match(name) {
        return Err(SysPkgError::Validation(format!(
            "Package name contains invalid characters: {:?}",
            name
        )));
    }

    // A leading dash would be read as an option by every supported tool
    if name.starts_with('-') {
        return Err(SysPkgError::Validation(format!(
            "Package name cannot start with '-': {:?}",
            name
        )));
    }

    Ok(())
}

/// Validate a non-empty list of package names.
pub fn validate_package_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(SysPkgError::Validation(
            "At least one package name is required".to_string(),
        ));
    }
    for name in names {
        validate_package_name(name)?;
    }
    Ok(())
}

/// Validate an optional list: empty is fine (e.g. "upgrade everything").
pub fn validate_optional_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    validate_package_names(names)
}
