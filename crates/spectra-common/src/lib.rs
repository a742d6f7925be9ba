pub mod device;
pub mod errors;
pub mod frequencies;
pub mod id;
pub mod protocol;

pub use device::DeviceType;
pub use errors::{ConfigError, ProtocolError, RelayError};
pub use frequencies::{interpolate, zeroed_snapshot, BarStats, DISPLAY_BARS, PLACEHOLDER_BINS};
pub use id::{new_id, now_millis, SessionId};
pub use protocol::{
    AudioData, AudioUpdate, ClientMessage, Connected, JoinRoom, LeaveRoom, MemberView,
    RoomSnapshot, ServerMessage,
};

pub type Result<T> = std::result::Result<T, RelayError>;
