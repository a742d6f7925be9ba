//! Tests for relay event handling and fan-out.

use super::*;
use spectra_common::{PLACEHOLDER_BINS, ProtocolError};

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";

fn relay() -> Relay {
    Relay::new(RelaySettings::default())
}

/// Everything queued for a session so far.
fn drain(rx: &mut OutboxReceiver) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Some(json) = rx.try_recv() {
        out.push(serde_json::from_str(&json).unwrap());
    }
    out
}

fn snapshots(messages: &[ServerMessage]) -> Vec<&RoomSnapshot> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::RoomUsersUpdate(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn audio_updates(messages: &[ServerMessage]) -> Vec<&AudioUpdate> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::AudioUpdate(u) => Some(u),
            _ => None,
        })
        .collect()
}

fn join(room: &str) -> JoinRoom {
    JoinRoom {
        room_id: Some(room.into()),
        device_type: Some("desktop".into()),
    }
}

fn audio(room: Option<&str>, frequencies: Vec<f64>, timestamp: Option<i64>) -> AudioData {
    AudioData {
        frequencies,
        timestamp,
        room_id: room.map(str::to_string),
        device_type: None,
    }
}

#[tokio::test]
async fn connect_sends_session_id_then_count() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;

    let msgs = drain(&mut rx_a);
    assert_eq!(
        msgs,
        vec![
            ServerMessage::Connected(Connected { id: a.clone() }),
            ServerMessage::ClientCount(1),
        ]
    );

    let (_b, _rx_b) = relay.connect(None).await;
    assert_eq!(drain(&mut rx_a), vec![ServerMessage::ClientCount(2)]);
    assert_eq!(relay.client_count().await, 2);
}

#[tokio::test]
async fn party_scenario() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;
    drain(&mut rx_a);

    // A joins: registry holds A with zeros.
    relay.join_room(&a, join("party")).await;
    let snap = relay.snapshot("party").await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[&a].frequencies, vec![0.0; PLACEHOLDER_BINS]);
    let msgs = drain(&mut rx_a);
    assert_eq!(snapshots(&msgs).len(), 1);

    // A sends audio alone: a snapshot, no audio-update.
    let freqs: Vec<f64> = (1..=8).map(|v| f64::from(v) * 10.0).collect();
    relay
        .audio_data(&a, audio(Some("party"), freqs.clone(), Some(1_000)))
        .await
        .unwrap();
    let msgs = drain(&mut rx_a);
    assert!(audio_updates(&msgs).is_empty());
    let snaps = snapshots(&msgs);
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0][&a].frequencies, freqs);

    // B joins: both see two entries.
    let (b, mut rx_b) = relay.connect(None).await;
    drain(&mut rx_a);
    drain(&mut rx_b);
    relay.join_room(&b, join("party")).await;
    for rx in [&mut rx_a, &mut rx_b] {
        let msgs = drain(rx);
        let snaps = snapshots(&msgs);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].len(), 2);
    }

    // B leaves: A sees only itself; the room stays.
    relay.disconnect(&b).await;
    let msgs = drain(&mut rx_a);
    let snaps = snapshots(&msgs);
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].keys().collect::<Vec<_>>(), vec![&a]);
    assert!(msgs.contains(&ServerMessage::ClientCount(1)));
    assert!(relay.snapshot("party").await.is_some());

    // A leaves: the room is gone.
    relay.disconnect(&a).await;
    assert!(relay.snapshot("party").await.is_none());
    assert_eq!(relay.room_count().await, 0);
    assert_eq!(relay.client_count().await, 0);
}

#[tokio::test]
async fn room_audio_excludes_sender() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;
    let (b, mut rx_b) = relay.connect(None).await;
    let (c, mut rx_c) = relay.connect(None).await;
    for id in [&a, &b, &c] {
        relay.join_room(id, join("r")).await;
    }
    drain(&mut rx_a);
    drain(&mut rx_b);
    drain(&mut rx_c);

    relay
        .audio_data(&b, audio(Some("r"), vec![3.0, 4.0], Some(42)))
        .await
        .unwrap();

    assert!(audio_updates(&drain(&mut rx_b)).is_empty());
    for rx in [&mut rx_a, &mut rx_c] {
        let msgs = drain(rx);
        let updates = audio_updates(&msgs);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].client_id, b);
        assert_eq!(updates[0].frequencies, vec![3.0, 4.0]);
        assert_eq!(updates[0].timestamp, 42);
        assert_eq!(updates[0].device_type, Some(DeviceType::Desktop));
        // Delta first, then the full snapshot.
        assert!(matches!(msgs.last(), Some(ServerMessage::RoomUsersUpdate(_))));
    }
}

#[tokio::test]
async fn snapshot_matches_registry_after_every_change() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;
    let (b, _rx_b) = relay.connect(None).await;

    relay.join_room(&a, join("r")).await;
    relay.join_room(&b, join("r")).await;
    relay
        .audio_data(&b, audio(Some("r"), vec![7.0], None))
        .await
        .unwrap();

    let msgs = drain(&mut rx_a);
    let last = *snapshots(&msgs).last().unwrap();
    assert_eq!(Some(last.clone()), relay.snapshot("r").await);
    assert_eq!(last[&b].frequencies, vec![7.0]);
}

#[tokio::test]
async fn global_audio_reaches_everyone_but_sender() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;
    let (_b, mut rx_b) = relay.connect(None).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    let mut data = audio(None, vec![1.0], Some(5));
    data.device_type = Some("mobile".into());
    relay.audio_data(&a, data).await.unwrap();

    assert!(drain(&mut rx_a).is_empty());
    let msgs = drain(&mut rx_b);
    assert_eq!(
        msgs,
        vec![ServerMessage::AudioUpdate(AudioUpdate {
            frequencies: vec![1.0],
            timestamp: 5,
            client_id: a.clone(),
            device_type: Some(DeviceType::Mobile),
        })]
    );
    assert_eq!(relay.room_count().await, 0);
}

#[tokio::test]
async fn empty_room_id_is_global() {
    let relay = relay();
    let (a, _rx_a) = relay.connect(None).await;
    let (_b, mut rx_b) = relay.connect(None).await;
    drain(&mut rx_b);

    relay
        .audio_data(&a, audio(Some(""), vec![2.0], None))
        .await
        .unwrap();
    assert_eq!(audio_updates(&drain(&mut rx_b)).len(), 1);
}

#[tokio::test]
async fn audio_for_unknown_room_is_dropped() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;
    let (b, mut rx_b) = relay.connect(None).await;
    relay.join_room(&a, join("r")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    relay
        .audio_data(&b, audio(Some("nowhere"), vec![1.0], None))
        .await
        .unwrap();

    assert!(drain(&mut rx_a).is_empty());
    assert!(drain(&mut rx_b).is_empty());
    assert!(relay.snapshot("nowhere").await.is_none());
    assert_eq!(relay.room_count().await, 1);
}

#[tokio::test]
async fn audio_from_non_member_enters_existing_room() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;
    let (b, mut rx_b) = relay.connect(Some(IPHONE_UA.into())).await;
    relay.join_room(&a, join("r")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    relay
        .audio_data(&b, audio(Some("r"), vec![3.0, 4.0], Some(5)))
        .await
        .unwrap();

    let to_a = drain(&mut rx_a);
    let updates = audio_updates(&to_a);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].client_id, b);
    assert_eq!(updates[0].device_type, Some(DeviceType::Mobile));

    let snapshot = relay.snapshot("r").await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[&b].frequencies, vec![3.0, 4.0]);
    assert_eq!(snapshot[&b].device_type, DeviceType::Mobile);

    // Now a member, the sender gets the snapshot but not its own update.
    let to_b = drain(&mut rx_b);
    assert_eq!(snapshots(&to_b).len(), 1);
    assert!(audio_updates(&to_b).is_empty());
    assert_eq!(relay.rooms_of(&b).await, vec!["r".to_string()]);
}

#[tokio::test]
async fn stored_timestamp_is_monotonic() {
    let relay = relay();
    let (a, _rx) = relay.connect(None).await;
    relay.join_room(&a, join("r")).await;
    let joined_at = relay.snapshot("r").await.unwrap()[&a].timestamp;

    relay
        .audio_data(&a, audio(Some("r"), vec![1.0], Some(1)))
        .await
        .unwrap();
    let snap = relay.snapshot("r").await.unwrap();
    assert_eq!(snap[&a].frequencies, vec![1.0]);
    assert!(snap[&a].timestamp >= joined_at);

    relay
        .audio_data(&a, audio(Some("r"), vec![2.0], None))
        .await
        .unwrap();
    assert!(relay.snapshot("r").await.unwrap()[&a].timestamp >= joined_at);
}

#[tokio::test]
async fn oversized_audio_is_rejected() {
    let relay = Relay::new(RelaySettings {
        max_frequency_bins: 4,
        ..RelaySettings::default()
    });
    let (a, _rx) = relay.connect(None).await;
    relay.join_room(&a, join("r")).await;

    let err = relay
        .audio_data(&a, audio(Some("r"), vec![0.0; 5], None))
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::TooManyBins { got: 5, max: 4 }));
    assert_eq!(
        relay.snapshot("r").await.unwrap()[&a].frequencies,
        vec![0.0; PLACEHOLDER_BINS]
    );
}

#[tokio::test]
async fn malformed_text_is_reported_and_ignored() {
    let relay = relay();
    let (a, _rx) = relay.connect(None).await;
    relay.join_room(&a, join("r")).await;

    let err = relay
        .handle_text(&a, r#"{"event":"audio-data","data":{"frequencies":"x","roomId":"r"}}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    assert!(relay.handle_text(&a, "{").await.is_err());
    assert!(relay
        .handle_text(&a, r#"{"event":"something-else"}"#)
        .await
        .is_ok());

    assert_eq!(
        relay.snapshot("r").await.unwrap()[&a].frequencies,
        vec![0.0; PLACEHOLDER_BINS]
    );
}

#[tokio::test]
async fn join_without_room_uses_default() {
    let relay = relay();
    let (a, _rx) = relay.connect(None).await;
    relay
        .handle_text(&a, r#"{"event":"join-room","data":{"roomId":""}}"#)
        .await
        .unwrap();
    assert!(relay.snapshot("default").await.is_some());

    let (b, _rx_b) = relay.connect(None).await;
    relay
        .handle_text(&b, r#"{"event":"join-room"}"#)
        .await
        .unwrap();
    assert_eq!(relay.snapshot("default").await.unwrap().len(), 2);
}

#[tokio::test]
async fn device_type_falls_back_to_user_agent() {
    let relay = relay();
    let (a, _rx) = relay.connect(Some(IPHONE_UA.into())).await;
    relay
        .join_room(
            &a,
            JoinRoom {
                room_id: Some("r".into()),
                device_type: None,
            },
        )
        .await;
    assert_eq!(
        relay.snapshot("r").await.unwrap()[&a].device_type,
        DeviceType::Mobile
    );

    // Sticky: audio frames cannot change it.
    let mut data = audio(Some("r"), vec![1.0], None);
    data.device_type = Some("desktop".into());
    relay.audio_data(&a, data).await.unwrap();
    assert_eq!(
        relay.snapshot("r").await.unwrap()[&a].device_type,
        DeviceType::Mobile
    );
}

#[tokio::test]
async fn rejoin_resets_entry() {
    let relay = relay();
    let (a, _rx) = relay.connect(None).await;
    relay.join_room(&a, join("r")).await;
    relay
        .audio_data(&a, audio(Some("r"), vec![9.0], None))
        .await
        .unwrap();
    relay.join_room(&a, join("r")).await;

    let snap = relay.snapshot("r").await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[&a].frequencies, vec![0.0; PLACEHOLDER_BINS]);
}

#[tokio::test]
async fn leave_room_notifies_remaining_members() {
    let relay = relay();
    let (a, mut rx_a) = relay.connect(None).await;
    let (b, mut rx_b) = relay.connect(None).await;
    relay.join_room(&a, join("r")).await;
    relay.join_room(&b, join("r")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    relay
        .leave_room(&b, LeaveRoom { room_id: "r".into() })
        .await;
    let msgs = drain(&mut rx_a);
    assert_eq!(snapshots(&msgs)[0].len(), 1);
    assert!(drain(&mut rx_b).is_empty());

    // Leaving again, or leaving a room never joined, does nothing.
    relay
        .leave_room(&b, LeaveRoom { room_id: "r".into() })
        .await;
    relay
        .leave_room(&b, LeaveRoom { room_id: "x".into() })
        .await;
    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(relay.client_count().await, 2);
}

#[tokio::test]
async fn disconnect_removes_session_from_every_room() {
    let relay = relay();
    let (a, _rx_a) = relay.connect(None).await;
    let (b, mut rx_b) = relay.connect(None).await;
    for room in ["one", "two"] {
        relay.join_room(&a, join(room)).await;
        relay.join_room(&b, join(room)).await;
    }
    relay.join_room(&a, join("solo")).await;
    assert_eq!(relay.rooms_of(&a).await, vec!["one", "solo", "two"]);
    drain(&mut rx_b);

    relay.disconnect(&a).await;

    assert!(relay.rooms_of(&a).await.is_empty());
    assert!(relay.snapshot("solo").await.is_none());
    let msgs = drain(&mut rx_b);
    let snaps = snapshots(&msgs);
    assert_eq!(snaps.len(), 2);
    assert!(snaps.iter().all(|s| s.len() == 1 && s.contains_key(&b)));

    // A second disconnect is a no-op.
    relay.disconnect(&a).await;
    assert!(drain(&mut rx_b).is_empty());
}

#[tokio::test]
async fn lagging_peer_still_gets_latest_snapshot() {
    let relay = Relay::new(RelaySettings {
        outbound_queue: 2,
        ..RelaySettings::default()
    });
    let (a, _rx_a) = relay.connect(None).await;
    // B never reads while A streams.
    let (b, mut rx_b) = relay.connect(None).await;
    relay.join_room(&a, join("r")).await;
    relay.join_room(&b, join("r")).await;

    for i in 0..50 {
        relay
            .audio_data(&a, audio(Some("r"), vec![f64::from(i)], None))
            .await
            .unwrap();
    }
    relay.disconnect(&a).await;

    let msgs = drain(&mut rx_b);
    // Only the newest deltas survive; snapshots and counts are coalesced.
    let updates = audio_updates(&msgs);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].frequencies, vec![48.0]);
    assert_eq!(updates[1].frequencies, vec![49.0]);
    assert_eq!(snapshots(&msgs).len(), 1);
    assert!(msgs.len() <= 5);

    let last = *snapshots(&msgs).last().unwrap();
    assert_eq!(Some(last.clone()), relay.snapshot("r").await);
    assert_eq!(last.keys().collect::<Vec<_>>(), vec![&b]);
    assert_eq!(msgs.last(), Some(&ServerMessage::ClientCount(1)));
}

#[tokio::test]
async fn lagging_peer_catches_up_after_room_goes_quiet() {
    let relay = Relay::new(RelaySettings {
        outbound_queue: 4,
        ..RelaySettings::default()
    });
    let (a, mut rx_a) = relay.connect(None).await;
    let (b, mut rx_b) = relay.connect(None).await;
    relay.join_room(&a, join("party")).await;
    relay.join_room(&b, join("party")).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    for i in 0..4 {
        relay
            .audio_data(&a, audio(Some("party"), vec![f64::from(i)], None))
            .await
            .unwrap();
    }
    relay.disconnect(&a).await;

    let msgs = drain(&mut rx_b);
    let last = *snapshots(&msgs).last().unwrap();
    assert_eq!(Some(last.clone()), relay.snapshot("party").await);
    assert!(!last.contains_key(&a));
}
