//! Configuration schema types for Spectra.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod server;
mod system;

pub use server::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct SpectraConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub heartbeat: HeartbeatConfig,
    pub logging: LoggingConfig,
    pub client: ClientConfig,
}

// =============================================================================
// Tests
// =============================================================================
