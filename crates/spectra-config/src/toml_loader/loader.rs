//! Locating, reading and first-run creation of the TOML config file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use spectra_common::ConfigError;
use tracing::info;

use crate::schema::SpectraConfig;

use super::template::default_config_toml;

const APP_DIR: &str = "spectra";
const FILE_NAME: &str = "config.toml";

/// `<platform config dir>/spectra/config.toml`.
///
/// On Linux that is `~/.config/spectra/config.toml`; on macOS
/// `~/Library/Application Support/spectra/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Load config from a specific TOML file. Missing keys take their defaults.
/// Validation is left to the caller so CLI overrides can be applied first.
pub fn load_from_path(path: &Path) -> Result<SpectraConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => io_error("cannot read", path, e),
    })?;

    let config = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Load the default config file, writing the commented template there
/// first if it does not exist yet.
pub fn load_default() -> Result<SpectraConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(SpectraConfig::default())
        }
        loaded => loaded,
    }
}

/// Write the commented template to `path`, creating missing directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_error("cannot create", dir, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_error("cannot write", path, e))?;
    info!(path = %path.display(), "Created default config");
    Ok(())
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> ConfigError {
    ConfigError::ParseError(format!("{action} {}: {e}", path.display()))
}
