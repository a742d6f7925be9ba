//! Client-side view of a room, rebuilt from relay output.

use std::collections::BTreeMap;

use spectra_common::{
    interpolate, AudioUpdate, BarStats, MemberView, RoomSnapshot, SessionId, DISPLAY_BARS,
};

use crate::types::ClientEvent;

/// Members of the joined room and their latest frequencies.
///
/// A `room-users-update` replaces the whole view; an `audio-update` only
/// touches the sender's entry until the next snapshot arrives.
#[derive(Debug, Clone, Default)]
pub struct RoomView {
    members: BTreeMap<SessionId, MemberView>,
}

impl RoomView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one client event into the view. Returns true if the view changed.
    pub fn apply(&mut self, event: &ClientEvent) -> bool {
        match event {
            ClientEvent::RoomUsers(snapshot) => {
                self.apply_snapshot(snapshot.clone());
                true
            }
            ClientEvent::AudioUpdate(update) => {
                self.apply_update(update);
                true
            }
            ClientEvent::Disconnected | ClientEvent::GaveUp => {
                let changed = !self.members.is_empty();
                self.members.clear();
                changed
            }
            _ => false,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: RoomSnapshot) {
        self.members = snapshot;
    }

    pub fn apply_update(&mut self, update: &AudioUpdate) {
        let device_type = update
            .device_type
            .or_else(|| self.members.get(&update.client_id).map(|m| m.device_type))
            .unwrap_or_default();
        self.members.insert(
            update.client_id.clone(),
            MemberView {
                id: update.client_id.clone(),
                device_type,
                frequencies: update.frequencies.clone(),
                timestamp: update.timestamp,
            },
        );
    }

    pub fn get(&self, id: &SessionId) -> Option<&MemberView> {
        self.members.get(id)
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberView> {
        self.members.values()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Equalizer bars for one member.
    pub fn bars(&self, id: &SessionId) -> Option<Vec<f64>> {
        self.members
            .get(id)
            .map(|m| interpolate(&m.frequencies, DISPLAY_BARS))
    }

    pub fn stats(&self, id: &SessionId) -> Option<BarStats> {
        self.bars(id).map(|bars| BarStats::from_bars(&bars))
    }
}
