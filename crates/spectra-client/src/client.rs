//! Public handle for talking to the relay.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use spectra_common::DeviceType;
use spectra_config::ClientConfig;

use crate::connection::connection_loop;
use crate::types::{ClientCommand, ClientEvent};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle for interacting with the relay connection.
///
/// All methods are non-blocking and send commands to the background
/// connection task.
pub struct RelayClient {
    command_tx: mpsc::Sender<ClientCommand>,
    connected: Arc<RwLock<bool>>,
}

impl RelayClient {
    /// Create a new client and start the background connection.
    /// Returns `(client, event_receiver)`.
    pub fn connect(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let connected = Arc::new(RwLock::new(false));

        let client = Self {
            command_tx,
            connected: Arc::clone(&connected),
        };

        tokio::spawn(connection_loop(config, connected, event_tx, command_rx));

        (client, event_rx)
    }

    /// Join a room, leaving none. The room is re-joined after reconnects.
    pub async fn join_room(&self, room_id: &str, device_type: Option<DeviceType>) {
        let _ = self
            .command_tx
            .send(ClientCommand::JoinRoom {
                room_id: room_id.to_string(),
                device_type,
            })
            .await;
    }

    /// Leave the current room.
    pub async fn leave_room(&self) {
        let _ = self.command_tx.send(ClientCommand::LeaveRoom).await;
    }

    /// Queue one audio frame for the current room (or globally if none).
    ///
    /// Returns false if the frame was dropped: not connected, or the command
    /// queue is full.
    pub async fn send_audio(&self, frequencies: Vec<f64>) -> bool {
        if !self.is_connected().await {
            return false;
        }
        self.command_tx
            .try_send(ClientCommand::SendAudio { frequencies })
            .is_ok()
    }

    /// Check if connected.
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Disconnect and stop reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(ClientCommand::Disconnect).await;
    }
}
