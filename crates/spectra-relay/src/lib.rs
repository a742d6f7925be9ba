//! spectra-relay: WebSocket room relay for live audio spectra.
//!
//! Clients join named rooms and stream frequency snapshots; the relay keeps
//! each room's latest snapshot per member and fans every change out to the
//! room. All state is in memory and lives as long as the process.

pub mod connection;
pub mod engine;
pub mod outbox;
pub mod registry;
pub mod server;

pub use engine::{Relay, RelaySettings};
pub use outbox::{Outbox, OutboxReceiver, Pushed, Slot};
pub use registry::{Member, Removal, Room, RoomRegistry};
pub use server::RelayServer;
