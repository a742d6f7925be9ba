//! Spectra configuration system.
//!
//! Provides TOML-based configuration with full validation. All config
//! sections use sensible defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use spectra_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

// Re-export core types for convenience
pub use schema::{
    ClientConfig, HeartbeatConfig, LimitsConfig, LogLevel, LoggingConfig, ServerConfig,
    SpectraConfig, CONFIG_SCHEMA_VERSION,
};
pub use validation::validate;

use spectra_common::ConfigError;
use std::path::Path;

/// Load config from `path`, or from the platform default path when `None`.
///
/// An explicit path must exist. The default path is created with a
/// commented template on first use. The result is not validated here so
/// callers can layer overrides on top before calling [`validate`].
pub fn load_config(path: Option<&Path>) -> Result<SpectraConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &SpectraConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&SpectraConfig::default());
        assert!(json.contains("\"server\""));
        assert!(json.contains("\"limits\""));
        assert!(json.contains("\"heartbeat\""));
        assert!(json.contains("\"logging\""));
        assert!(json.contains("\"client\""));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&SpectraConfig::default());
        let parsed: SpectraConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.server.default_room, "default");
        assert_eq!(parsed.limits.outbound_queue, 256);
    }

    #[test]
    fn load_config_with_explicit_missing_path_fails() {
        let err = load_config(Some(Path::new("/tmp/spectra-no-such-dir/config.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
