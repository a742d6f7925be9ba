//! Per-section validators.

use crate::schema::SpectraConfig;

use super::helpers::{validate_non_empty, validate_range};

/// Validate listener settings. Port `0` (ephemeral) is allowed.
pub(crate) fn validate_server(errors: &mut Vec<String>, config: &SpectraConfig) {
    validate_non_empty(errors, "server.host", &config.server.host);
    validate_non_empty(errors, "server.default_room", &config.server.default_room);
    if !config.server.path.starts_with('/') {
        errors.push(format!(
            "server.path = {:?} must start with '/'",
            config.server.path
        ));
    }
}

/// Validate payload and queue bounds.
pub(crate) fn validate_limits(errors: &mut Vec<String>, config: &SpectraConfig) {
    validate_range(
        errors,
        "limits.max_frequency_bins",
        config.limits.max_frequency_bins,
        1,
        65_536,
    );
    validate_range(
        errors,
        "limits.max_message_bytes",
        config.limits.max_message_bytes,
        1024,
        16 * 1024 * 1024,
    );
    validate_range(
        errors,
        "limits.outbound_queue",
        config.limits.outbound_queue,
        1,
        65_536,
    );
}

/// Validate heartbeat timings.
pub(crate) fn validate_heartbeat(errors: &mut Vec<String>, config: &SpectraConfig) {
    validate_range(
        errors,
        "heartbeat.ping_interval_secs",
        config.heartbeat.ping_interval_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "heartbeat.ping_timeout_secs",
        config.heartbeat.ping_timeout_secs,
        1,
        300,
    );
}

/// Validate client reconnect settings.
pub(crate) fn validate_client(errors: &mut Vec<String>, config: &SpectraConfig) {
    let client = &config.client;
    if !(client.url.starts_with("ws://") || client.url.starts_with("wss://")) {
        errors.push(format!("client.url = {:?} must be a ws:// or wss:// URL", client.url));
    }
    validate_range(
        errors,
        "client.reconnect_attempts",
        client.reconnect_attempts,
        1,
        100,
    );
    validate_range(
        errors,
        "client.reconnect_delay_ms",
        client.reconnect_delay_ms,
        10,
        60_000,
    );
    if client.max_reconnect_delay_ms < client.reconnect_delay_ms {
        errors.push(format!(
            "client.max_reconnect_delay_ms = {} is below client.reconnect_delay_ms = {}",
            client.max_reconnect_delay_ms, client.reconnect_delay_ms
        ));
    }
    validate_range(
        errors,
        "client.connect_timeout_secs",
        client.connect_timeout_secs,
        1,
        120,
    );
}
