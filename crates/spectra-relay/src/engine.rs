//! Relay engine: applies client events to the room registry and fans the
//! results out to connected sessions.
//!
//! Every event runs to completion under one lock over the registry and the
//! outbound queue table, so no event ever observes another half-applied.
//! Fan-out pushes into each session's [`Outbox`](crate::outbox::Outbox) and
//! never waits on a slow peer while holding it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use spectra_common::{
    now_millis, zeroed_snapshot, AudioData, AudioUpdate, ClientMessage, Connected, DeviceType,
    JoinRoom, LeaveRoom, ProtocolError, RoomSnapshot, ServerMessage, SessionId,
};
use spectra_config::SpectraConfig;

use crate::outbox::{outbox, Outbox, OutboxReceiver, Pushed, Slot};
use crate::registry::{Removal, RoomRegistry};

/// Engine settings taken from the relay config.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub default_room: String,
    pub max_frequency_bins: usize,
    pub outbound_queue: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&SpectraConfig::default())
    }
}

impl RelaySettings {
    pub fn from_config(config: &SpectraConfig) -> Self {
        Self {
            default_room: config.server.default_room.clone(),
            max_frequency_bins: config.limits.max_frequency_bins,
            outbound_queue: config.limits.outbound_queue,
        }
    }
}

/// A connected session's outbound side.
struct Peer {
    outbox: Outbox,
    user_agent: Option<String>,
}

#[derive(Default)]
struct RelayState {
    registry: RoomRegistry,
    peers: HashMap<SessionId, Peer>,
}

/// Shared handle to the relay. Cheap to clone.
#[derive(Clone)]
pub struct Relay {
    state: Arc<Mutex<RelayState>>,
    settings: Arc<RelaySettings>,
}

impl Relay {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState::default())),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Register a new connection. Returns its session id and the queue of
    /// JSON frames to write to its socket.
    ///
    /// The new session is told its id, then everyone gets the new count.
    pub async fn connect(&self, user_agent: Option<String>) -> (SessionId, OutboxReceiver) {
        let session_id = SessionId::new();
        let (tx, rx) = outbox(self.settings.outbound_queue);

        let mut state = self.state.lock().await;
        state.peers.insert(
            session_id.clone(),
            Peer {
                outbox: tx,
                user_agent,
            },
        );
        state.send_to(
            &session_id,
            &ServerMessage::Connected(Connected {
                id: session_id.clone(),
            }),
        );
        let count = state.peers.len();
        state.broadcast_all(&ServerMessage::ClientCount(count), None);

        info!(session = %session_id, clients = count, "Session connected");
        (session_id, rx)
    }

    /// Parse and apply one text frame from a session.
    pub async fn handle_text(&self, session_id: &SessionId, text: &str) -> Result<(), ProtocolError> {
        match ClientMessage::parse(text)? {
            Some(message) => self.handle_message(session_id, message).await,
            None => {
                debug!(session = %session_id, "Ignoring unknown event");
                Ok(())
            }
        }
    }

    pub async fn handle_message(
        &self,
        session_id: &SessionId,
        message: ClientMessage,
    ) -> Result<(), ProtocolError> {
        match message {
            ClientMessage::JoinRoom(join) => {
                self.join_room(session_id, join).await;
                Ok(())
            }
            ClientMessage::LeaveRoom(leave) => {
                self.leave_room(session_id, leave).await;
                Ok(())
            }
            ClientMessage::AudioData(data) => self.audio_data(session_id, data).await,
        }
    }

    /// Put the session into a room with a zeroed snapshot and send the room
    /// its new member set. Re-joining resets the session's entry.
    pub async fn join_room(&self, session_id: &SessionId, join: JoinRoom) {
        let room_id = join
            .room_id
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.settings.default_room.clone());

        let mut state = self.state.lock().await;
        let Some(peer) = state.peers.get(session_id) else {
            debug!(session = %session_id, room = %room_id, "Join from unknown session");
            return;
        };
        let device_type =
            DeviceType::classify(join.device_type.as_deref(), peer.user_agent.as_deref());

        state.registry.upsert_member(
            &room_id,
            session_id,
            device_type,
            zeroed_snapshot(),
            now_millis(),
        );
        info!(
            session = %session_id,
            room = %room_id,
            device = %device_type,
            members = state.registry.member_count(&room_id),
            "Joined room"
        );
        state.broadcast_snapshot(&room_id);
    }

    /// Take the session out of a room; remaining members get the new set.
    pub async fn leave_room(&self, session_id: &SessionId, leave: LeaveRoom) {
        let mut state = self.state.lock().await;
        state.remove_from_room(&leave.room_id, session_id);
    }

    /// Relay one audio frame.
    ///
    /// With a room: the sender's stored snapshot is refreshed (a sender that
    /// is not yet a member is added), the other members get the frame as
    /// `audio-update`, then every member gets the full room snapshot. Frames
    /// for a room that does not exist are dropped. Without a room: every
    /// other session gets the frame and nothing is stored.
    pub async fn audio_data(&self, session_id: &SessionId, data: AudioData) -> Result<(), ProtocolError> {
        if data.frequencies.len() > self.settings.max_frequency_bins {
            return Err(ProtocolError::TooManyBins {
                got: data.frequencies.len(),
                max: self.settings.max_frequency_bins,
            });
        }
        let timestamp = data.timestamp.unwrap_or_else(now_millis);
        trace!(
            session = %session_id,
            room = ?data.room(),
            bins = data.frequencies.len(),
            timestamp,
            "audio-data received"
        );

        let mut state = self.state.lock().await;

        let Some(room_id) = data.room().map(str::to_string) else {
            let update = AudioUpdate {
                frequencies: data.frequencies,
                timestamp,
                client_id: session_id.clone(),
                device_type: data.device_type.as_deref().and_then(DeviceType::from_hint),
            };
            state.broadcast_all(&ServerMessage::AudioUpdate(update), Some(session_id));
            return Ok(());
        };

        if !state.registry.contains_room(&room_id) {
            debug!(session = %session_id, room = %room_id, "Audio for an unknown room");
            return Ok(());
        }

        let frequencies = data.frequencies;
        let refreshed = state
            .registry
            .refresh_member(&room_id, session_id, frequencies.clone(), timestamp)
            .map(|member| member.device_type);
        let device_type = match refreshed {
            Some(device_type) => device_type,
            None => {
                // Sender is not a member yet: it enters the room with this frame.
                let Some(peer) = state.peers.get(session_id) else {
                    debug!(session = %session_id, room = %room_id, "Audio from unknown session");
                    return Ok(());
                };
                let user_agent = peer.user_agent.clone();
                let device_type =
                    DeviceType::classify(data.device_type.as_deref(), user_agent.as_deref());
                state.registry.upsert_member(
                    &room_id,
                    session_id,
                    device_type,
                    frequencies.clone(),
                    timestamp,
                );
                info!(session = %session_id, room = %room_id, device = %device_type, "Joined room via audio");
                device_type
            }
        };

        let update = AudioUpdate {
            frequencies,
            timestamp,
            client_id: session_id.clone(),
            device_type: Some(device_type),
        };
        state.send_room(&room_id, &ServerMessage::AudioUpdate(update), Some(session_id));
        state.broadcast_snapshot(&room_id);
        Ok(())
    }

    /// Tear down a session: leave every room (remaining members get the new
    /// set), drop its queue, and send everyone the new count.
    pub async fn disconnect(&self, session_id: &SessionId) {
        let mut state = self.state.lock().await;

        for room_id in state.registry.rooms_of(session_id) {
            state.remove_from_room(&room_id, session_id);
        }
        if state.peers.remove(session_id).is_none() {
            return;
        }
        let count = state.peers.len();
        state.broadcast_all(&ServerMessage::ClientCount(count), None);
        info!(session = %session_id, clients = count, "Session disconnected");
    }

    /// Number of connected sessions, joined to a room or not.
    pub async fn client_count(&self) -> usize {
        self.state.lock().await.peers.len()
    }

    pub async fn room_count(&self) -> usize {
        self.state.lock().await.registry.room_count()
    }

    pub async fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.state.lock().await.registry.snapshot(room_id)
    }

    pub async fn rooms_of(&self, session_id: &SessionId) -> Vec<String> {
        self.state.lock().await.registry.rooms_of(session_id)
    }
}

impl RelayState {
    fn remove_from_room(&mut self, room_id: &str, session_id: &SessionId) {
        match self.registry.remove_member(room_id, session_id) {
            Removal::NotMember => {
                debug!(session = %session_id, room = %room_id, "Leave for a room the session is not in");
            }
            Removal::Removed => {
                info!(session = %session_id, room = %room_id, "Left room");
                self.broadcast_snapshot(room_id);
            }
            Removal::RoomClosed => {
                info!(session = %session_id, room = %room_id, "Left room, room closed");
            }
        }
    }

    /// Send a room's full member set to every member.
    fn broadcast_snapshot(&self, room_id: &str) {
        if let Some(snapshot) = self.registry.snapshot(room_id) {
            self.send_room(room_id, &ServerMessage::RoomUsersUpdate(snapshot), None);
        }
    }

    fn send_room(&self, room_id: &str, message: &ServerMessage, except: Option<&SessionId>) {
        let Some(room) = self.registry.room(room_id) else {
            return;
        };
        let Some(json) = encode(message) else {
            return;
        };
        let slot = slot_of(message, Some(room_id));
        for member in room.session_ids().filter(|id| Some(*id) != except) {
            self.push(member, &json, &slot);
        }
    }

    fn broadcast_all(&self, message: &ServerMessage, except: Option<&SessionId>) {
        let Some(json) = encode(message) else {
            return;
        };
        let slot = slot_of(message, None);
        for id in self.peers.keys().filter(|id| Some(*id) != except) {
            self.push(id, &json, &slot);
        }
    }

    fn send_to(&self, session_id: &SessionId, message: &ServerMessage) {
        if let Some(json) = encode(message) {
            self.push(session_id, &json, &slot_of(message, None));
        }
    }

    fn push(&self, session_id: &SessionId, json: &str, slot: &Option<Slot>) {
        let Some(peer) = self.peers.get(session_id) else {
            return;
        };
        match peer.outbox.push(json.to_string(), slot.clone()) {
            Pushed::Queued | Pushed::Replaced => {}
            Pushed::EvictedOldest => {
                debug!(session = %session_id, "Outbound queue full, evicted oldest audio update");
            }
            Pushed::Closed => {
                trace!(session = %session_id, "Outbound queue closed");
            }
        }
    }
}

/// Latest-wins slot for a message; audio deltas have none.
fn slot_of(message: &ServerMessage, room_id: Option<&str>) -> Option<Slot> {
    match (message, room_id) {
        (ServerMessage::Connected(_), _) => Some(Slot::Connected),
        (ServerMessage::ClientCount(_), _) => Some(Slot::ClientCount),
        (ServerMessage::RoomUsersUpdate(_), Some(room_id)) => Some(Slot::Room(room_id.to_string())),
        (ServerMessage::RoomUsersUpdate(_), None) | (ServerMessage::AudioUpdate(_), _) => None,
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize outbound message");
            None
        }
    }
}

#[cfg(test)]
mod tests;
