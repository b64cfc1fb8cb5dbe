use crate::error::{Result, SysPkgError};
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.kdl";

/// Environment override for the settings file location
pub const CONFIG_ENV: &str = "SYSPKG_CONFIG";

pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return Ok(path.to_path_buf());
    }

    let user_dirs = UserDirs::new()
        .ok_or_else(|| SysPkgError::Other("Could not determine user home directory".to_string()))?;
    let home = user_dirs.home_dir();

    if path_str == "~" {
        return Ok(home.to_path_buf());
    }

    let stripped = path_str
        .strip_prefix("~/")
        .ok_or_else(|| SysPkgError::Other(format!("Invalid path format: {}", path_str)))?;

    Ok(home.join(stripped))
}

pub fn config_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("", "", "syspkg")
        .ok_or_else(|| SysPkgError::Other("Could not determine config directory".to_string()))?;
    Ok(proj.config_dir().to_path_buf())
}

pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Settings file to read, if any.
///
/// An explicit path (flag, then [`CONFIG_ENV`]) must exist. The default
/// location is optional.
pub fn resolve_settings_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let requested = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
    };

    if let Some(path) = requested {
        let path = expand_home(&path)?;
        if !path.is_file() {
            return Err(SysPkgError::ConfigNotFound { path });
        }
        return Ok(Some(path));
    }

    let default = settings_file()?;
    Ok(default.is_file().then_some(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_untouched() {
        let path = Path::new("/etc/syspkg/settings.kdl");
        assert_eq!(expand_home(path).unwrap(), path);
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = resolve_settings_file(Some(Path::new("/nonexistent/syspkg.kdl"))).unwrap_err();
        assert!(matches!(err, SysPkgError::ConfigNotFound { .. }));
    }

    #[test]
    fn explicit_path_is_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let found = resolve_settings_file(Some(file.path())).unwrap();
        assert_eq!(found.as_deref(), Some(file.path()));
    }
}
