//! Configuration file location
//!
//! A `surface.yaml` in the current working directory wins (typical when
//! running from a checkout). Otherwise the file lives in the platform config
//! directory, e.g. `~/.config/surface-bind/surface.yaml` on Linux.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the platform config dir
const APP_DIR: &str = "surface-bind";

/// Default configuration file name
pub const CONFIG_FILE: &str = "surface.yaml";

/// Where the configuration is read from when `--config` is not given
pub fn default_config_path() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_config_path(&cwd, dirs::config_dir().as_deref())
}

fn resolve_config_path(cwd: &Path, config_dir: Option<&Path>) -> PathBuf {
    let local = cwd.join(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    match config_dir {
        Some(dir) => dir.join(APP_DIR).join(CONFIG_FILE),
        None => local,
    }
}

/// Create the parent directory of `config` if it is missing
pub fn ensure_config_dir(config: &Path) -> anyhow::Result<()> {
    if let Some(parent) = config.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating config directory: {}", parent.display());
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cwd_config_wins() {
        let cwd = TempDir::new().unwrap();
        let config_dir = TempDir::new().unwrap();
        std::fs::write(cwd.path().join(CONFIG_FILE), "").unwrap();

        let path = resolve_config_path(cwd.path(), Some(config_dir.path()));
        assert_eq!(path, cwd.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_falls_back_to_config_dir() {
        let cwd = TempDir::new().unwrap();
        let config_dir = TempDir::new().unwrap();

        let path = resolve_config_path(cwd.path(), Some(config_dir.path()));
        assert_eq!(path, config_dir.path().join(APP_DIR).join(CONFIG_FILE));

        ensure_config_dir(&path).unwrap();
        assert!(config_dir.path().join(APP_DIR).is_dir());
    }

    #[test]
    fn test_without_config_dir_uses_cwd() {
        let cwd = TempDir::new().unwrap();
        assert_eq!(resolve_config_path(cwd.path(), None), cwd.path().join(CONFIG_FILE));
    }
}
