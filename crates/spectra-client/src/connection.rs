//! Background WebSocket connection loop with auto-reconnect.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use spectra_common::{
    now_millis, AudioData, ClientMessage, Connected, JoinRoom, LeaveRoom, ServerMessage,
};
use spectra_config::ClientConfig;

use crate::backoff::Backoff;
use crate::types::{ClientCommand, ClientEvent, RoomIntent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a session ended.
enum SessionEnd {
    /// Socket dropped; reconnect.
    Lost,
    /// The application asked to disconnect, or dropped the client.
    Stopped,
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task managing the relay connection with auto-reconnect.
pub(crate) async fn connection_loop(
    config: ClientConfig,
    connected: Arc<RwLock<bool>>,
    event_tx: mpsc::Sender<ClientEvent>,
    mut command_rx: mpsc::Receiver<ClientCommand>,
) {
    let mut intent = RoomIntent::default();
    let mut backoff = Backoff::from_config(&config);
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

    loop {
        info!(url = %config.url, "Connecting to relay");

        match tokio::time::timeout(
            connect_timeout,
            tokio_tungstenite::connect_async(config.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws, _))) => {
                backoff.reset();
                *connected.write().await = true;

                let end = run_session(ws, &mut intent, &event_tx, &mut command_rx).await;

                *connected.write().await = false;
                let _ = event_tx.send(ClientEvent::Disconnected).await;
                if let SessionEnd::Stopped = end {
                    info!("Relay client stopped");
                    return;
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to relay");
                let _ = event_tx
                    .send(ClientEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!(timeout = ?connect_timeout, "Relay connection timed out");
                let _ = event_tx
                    .send(ClientEvent::Error(format!(
                        "Connection timed out after {}s",
                        connect_timeout.as_secs()
                    )))
                    .await;
            }
        }

        let Some(delay) = backoff.next_delay() else {
            warn!(attempts = backoff.attempts(), "Giving up on relay");
            let _ = event_tx.send(ClientEvent::GaveUp).await;
            return;
        };
        info!(delay_ms = delay.as_millis() as u64, "Reconnecting");
        if !wait_for_retry(delay, &mut intent, &mut command_rx).await {
            return;
        }
    }
}

/// Sleep out a backoff delay while still tracking room changes.
/// Returns false if the client should stop.
async fn wait_for_retry(
    delay: Duration,
    intent: &mut RoomIntent,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = command_rx.recv() => match cmd {
                Some(ClientCommand::JoinRoom { room_id, device_type }) => {
                    intent.room_id = Some(room_id);
                    intent.device_type = device_type;
                }
                Some(ClientCommand::LeaveRoom) => intent.room_id = None,
                // Audio is live data; nothing to replay.
                Some(ClientCommand::SendAudio { .. }) => {}
                Some(ClientCommand::Disconnect) | None => return false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

async fn run_session(
    ws: Socket,
    intent: &mut RoomIntent,
    event_tx: &mpsc::Sender<ClientEvent>,
    command_rx: &mut mpsc::Receiver<ClientCommand>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    // Rejoin the current room.
    if let Some(room_id) = &intent.room_id {
        let join = join_message(room_id.clone(), intent);
        if send(&mut sink, &join).await.is_err() {
            return SessionEnd::Lost;
        }
        debug!(room = %room_id, "Rejoined room");
    }

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                let message = match cmd {
                    Some(ClientCommand::JoinRoom { room_id, device_type }) => {
                        intent.device_type = device_type;
                        intent.room_id = Some(room_id.clone());
                        Some(join_message(room_id, intent))
                    }
                    Some(ClientCommand::LeaveRoom) => intent
                        .room_id
                        .take()
                        .map(|room_id| ClientMessage::LeaveRoom(LeaveRoom { room_id })),
                    Some(ClientCommand::SendAudio { frequencies }) => {
                        Some(ClientMessage::AudioData(AudioData {
                            frequencies,
                            timestamp: Some(now_millis()),
                            room_id: intent.room_id.clone(),
                            device_type: intent.device_type.map(|d| d.as_str().to_string()),
                        }))
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return SessionEnd::Stopped;
                    }
                };
                if let Some(message) = message {
                    if send(&mut sink, &message).await.is_err() {
                        return SessionEnd::Lost;
                    }
                }
            }

            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(message) => {
                            if event_tx.send(into_event(message)).await.is_err() {
                                // Nobody is listening anymore.
                                let _ = sink.send(WsMessage::Close(None)).await;
                                return SessionEnd::Stopped;
                            }
                        }
                        Err(e) => debug!(error = %e, "Unrecognized message from relay"),
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = sink.send(WsMessage::Pong(data)).await;
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Relay closed connection");
                    return SessionEnd::Lost;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return SessionEnd::Lost;
                }
                _ => {}
            },
        }
    }
}

fn join_message(room_id: String, intent: &RoomIntent) -> ClientMessage {
    ClientMessage::JoinRoom(JoinRoom {
        room_id: Some(room_id),
        device_type: intent.device_type.map(|d| d.as_str().to_string()),
    })
}

async fn send<S>(sink: &mut S, message: &ClientMessage) -> Result<(), ()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(event = message.event_name(), error = %e, "Failed to encode message");
            return Ok(());
        }
    };
    sink.send(WsMessage::Text(json.into())).await.map_err(|_| ())
}

fn into_event(message: ServerMessage) -> ClientEvent {
    match message {
        ServerMessage::Connected(Connected { id }) => ClientEvent::Connected { session_id: id },
        ServerMessage::RoomUsersUpdate(snapshot) => ClientEvent::RoomUsers(snapshot),
        ServerMessage::AudioUpdate(update) => ClientEvent::AudioUpdate(update),
        ServerMessage::ClientCount(count) => ClientEvent::ClientCount(count),
    }
}
