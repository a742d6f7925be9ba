//! Client for the spectra relay.
//!
//! Keeps one WebSocket to the relay open in the background, reconnecting
//! with backoff, re-joining the current room after every reconnect, and
//! surfacing relay output as [`ClientEvent`]s.

mod backoff;
mod client;
mod connection;
mod room_view;
mod types;

pub use backoff::Backoff;
pub use client::RelayClient;
pub use room_view::RoomView;
pub use types::ClientEvent;
