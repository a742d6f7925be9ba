//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Spectra Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# host = "0.0.0.0"
# port = 3000              # 1-65535, PORT env or --port override
# path = "/api/socket/"    # WebSocket handshake path
# default_room = "default"

[limits]
# max_frequency_bins = 4096   # 1-65536
# max_message_bytes = 262144  # 1024-16777216
# outbound_queue = 256        # 1-65536

[heartbeat]
# ping_interval_secs = 25  # 1-300
# ping_timeout_secs = 20   # 1-300

[logging]
# level = "info"           # trace, debug, info, warn, error

[client]
# url = "ws://127.0.0.1:3000/api/socket/"
# reconnect_attempts = 5       # 1-100
# reconnect_delay_ms = 1000    # 10-60000
# max_reconnect_delay_ms = 5000
# connect_timeout_secs = 15    # 1-120
"##
    .to_string()
}
