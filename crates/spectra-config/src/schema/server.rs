use serde::{Deserialize, Serialize};

/// Listener settings for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port (valid range: 1-65535). `0` is accepted by tests only.
    pub port: u16,
    /// HTTP path the WebSocket handshake must target.
    pub path: String,
    /// Room used when a join names none.
    pub default_room: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            path: "/api/socket/".into(),
            default_room: "default".into(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bounds on what a single client may push through the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest `frequencies` array accepted in one audio frame.
    pub max_frequency_bins: usize,
    /// Largest WebSocket message accepted, in bytes.
    pub max_message_bytes: usize,
    /// Outbound messages queued per connection before new ones are dropped.
    pub outbound_queue: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frequency_bins: 4096,
            max_message_bytes: 256 * 1024,
            outbound_queue: 256,
        }
    }
}

/// Liveness checks on idle connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub ping_interval_secs: u64,
    /// Extra grace after a missed ping before the connection is dropped.
    pub ping_timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 25,
            ping_timeout_secs: 20,
        }
    }
}

impl HeartbeatConfig {
    /// Silence after which a connection is considered dead.
    pub fn idle_limit(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ping_interval_secs + self.ping_timeout_secs)
    }
}
