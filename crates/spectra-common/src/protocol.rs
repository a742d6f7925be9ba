//! Wire protocol between browser clients and the relay.
//!
//! Every WebSocket text frame is a JSON envelope `{"event": ..., "data": ...}`
//! with kebab-case event names. Client frames are parsed in two steps (the
//! envelope, then the payload for the named event) so a bad payload can be
//! reported against its event and an unknown event can be skipped.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::device::DeviceType;
use crate::errors::ProtocolError;
use crate::id::SessionId;

pub const EVENT_JOIN_ROOM: &str = "join-room";
pub const EVENT_LEAVE_ROOM: &str = "leave-room";
pub const EVENT_AUDIO_DATA: &str = "audio-data";

/// Untyped frame as it arrives on the socket.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoom {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioData {
    #[serde(deserialize_with = "lenient_bins")]
    pub frequencies: Vec<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

/// Browsers serialize `NaN` and `Infinity` as `null`; such bins read as 0.
fn lenient_bins<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let bins = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(bins
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()).unwrap_or(0.0))
        .collect())
}

/// Any JSON number, truncated to whole milliseconds. `null` means absent.
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let millis = Option::<f64>::deserialize(deserializer)?;
    Ok(millis.filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
}

impl AudioData {
    /// Target room; an empty id means the frame is global.
    pub fn room(&self) -> Option<&str> {
        self.room_id.as_deref().filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom(JoinRoom),
    LeaveRoom(LeaveRoom),
    AudioData(AudioData),
}

impl ClientMessage {
    /// Parse a client frame. `Ok(None)` means a well-formed envelope naming
    /// an event the relay does not handle.
    pub fn parse(text: &str) -> Result<Option<Self>, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        let message = match envelope.event.as_str() {
            EVENT_JOIN_ROOM => {
                // A join without options goes to the default room.
                if envelope.data.is_null() {
                    Self::JoinRoom(JoinRoom::default())
                } else {
                    Self::JoinRoom(payload(EVENT_JOIN_ROOM, envelope.data)?)
                }
            }
            EVENT_LEAVE_ROOM => Self::LeaveRoom(payload(EVENT_LEAVE_ROOM, envelope.data)?),
            EVENT_AUDIO_DATA => Self::AudioData(payload(EVENT_AUDIO_DATA, envelope.data)?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => EVENT_JOIN_ROOM,
            Self::LeaveRoom(_) => EVENT_LEAVE_ROOM,
            Self::AudioData(_) => EVENT_AUDIO_DATA,
        }
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// One member's entry in a room snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: SessionId,
    pub device_type: DeviceType,
    pub frequencies: Vec<f64>,
    pub timestamp: i64,
}

/// Full member set of a room, keyed by session id.
pub type RoomSnapshot = BTreeMap<SessionId, MemberView>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioUpdate {
    pub frequencies: Vec<f64>,
    pub timestamp: i64,
    pub client_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connected {
    pub id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once to a new connection with its session id.
    Connected(Connected),
    RoomUsersUpdate(RoomSnapshot),
    AudioUpdate(AudioUpdate),
    ClientCount(usize),
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
    }
}
