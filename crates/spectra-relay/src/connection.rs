//! Per-connection handler: handshake, register with the relay, then pump
//! frames both ways until the socket closes.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, StatusCode};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use spectra_common::RelayError;
use spectra_config::{HeartbeatConfig, SpectraConfig};

use crate::engine::Relay;

/// What the handshake learned about the client.
#[derive(Debug, Default, Clone)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
}

/// True when `requested` names the configured socket path. A trailing slash
/// on either side is ignored.
pub fn path_matches(configured: &str, requested: &str) -> bool {
    configured.trim_end_matches('/') == requested.trim_end_matches('/')
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("not found".into()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Complete the WebSocket handshake on `stream`.
///
/// Rejects requests for any path but the configured one with a 404.
pub async fn accept(
    stream: TcpStream,
    config: &SpectraConfig,
) -> Result<(WebSocketStream<TcpStream>, ClientInfo), RelayError> {
    let mut info = ClientInfo::default();
    let path = config.server.path.as_str();

    let callback = |request: &Request, response: Response| {
        if !path_matches(path, request.uri().path()) {
            tracing::debug!(path = %request.uri().path(), "Rejecting handshake for unknown path");
            return Err(not_found());
        }
        info.user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(response)
    };

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.limits.max_message_bytes);
    ws_config.max_frame_size = Some(config.limits.max_message_bytes);

    let ws = tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config))
        .await
        .map_err(|e| RelayError::Transport(e.to_string()))?;
    Ok((ws, info))
}

/// Drive one connected client until it goes away or `shutdown` fires.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    info: ClientInfo,
    relay: Relay,
    heartbeat: HeartbeatConfig,
    shutdown: CancellationToken,
) {
    let (mut sink, mut stream) = ws.split();
    let (session_id, mut rx) = relay.connect(info.user_agent).await;

    tracing::info!(peer = %addr, session = %session_id, "Client connected");

    let idle_limit = heartbeat.idle_limit();
    let mut ping = tokio::time::interval(Duration::from_secs(heartbeat.ping_interval_secs.max(1)));
    ping.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // Queued relay output -> this client's socket
            outbound = rx.recv() => {
                let Some(json) = outbound else { break };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }

            // This client's socket -> relay
            frame = stream.next() => {
                last_seen = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = relay.handle_text(&session_id, text.as_str()).await {
                            tracing::warn!(session = %session_id, error = %e, "Dropping client frame");
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(session = %session_id, "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!(peer = %addr, session = %session_id, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() > idle_limit {
                    tracing::info!(session = %session_id, "Heartbeat timeout");
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    relay.disconnect(&session_id).await;
    tracing::info!(peer = %addr, session = %session_id, "Client disconnected");
}
