//! Full configuration validation.
//!
//! Validates numeric ranges and string shapes. Each section has its own
//! function; this orchestrator calls them all and collects errors into a
//! single `ConfigError`.

mod helpers;
mod sections;


use crate::schema::SpectraConfig;
use spectra_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &SpectraConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_server(&mut errors, config);
    sections::validate_limits(&mut errors, config);
    sections::validate_heartbeat(&mut errors, config);
    sections::validate_client(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
