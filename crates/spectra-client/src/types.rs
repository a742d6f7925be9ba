//! Event and command enums for the relay client.

use spectra_common::{AudioUpdate, DeviceType, RoomSnapshot, SessionId};

// ---------------------------------------------------------------------------
// Events & Commands
// ---------------------------------------------------------------------------

/// Events emitted by the relay client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Connected; the relay assigned this session id.
    Connected { session_id: SessionId },
    /// Full member set of the joined room.
    RoomUsers(RoomSnapshot),
    /// One peer's fresh audio frame.
    AudioUpdate(AudioUpdate),
    /// Number of sessions connected to the relay.
    ClientCount(usize),
    /// Connection lost; a reconnect follows unless attempts are exhausted.
    Disconnected,
    /// Every reconnect attempt failed. The client has stopped.
    GaveUp,
    Error(String),
}

/// Commands sent to the connection task from the application layer.
#[derive(Debug)]
pub(crate) enum ClientCommand {
    JoinRoom {
        room_id: String,
        device_type: Option<DeviceType>,
    },
    LeaveRoom,
    SendAudio {
        frequencies: Vec<f64>,
    },
    Disconnect,
}

/// Room the client wants to be in. Survives reconnects.
#[derive(Debug, Default, Clone)]
pub(crate) struct RoomIntent {
    pub(crate) room_id: Option<String>,
    pub(crate) device_type: Option<DeviceType>,
}
