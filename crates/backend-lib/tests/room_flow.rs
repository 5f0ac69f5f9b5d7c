// ==========================
// backend-lib/tests/room_flow.rs
// ==========================
//! Registry-level scenario tests. Connections are plain mpsc receivers; time
//! is driven by `ManualClock` so the 24-hour admin reset is deterministic.

use std::sync::Arc;

use chrono::{Duration, Utc};
use pointing_backend_lib::clock::ManualClock;
use pointing_backend_lib::config::Settings;
use pointing_backend_lib::error::JoinError;
use pointing_backend_lib::registry::RoomRegistry;
use pointing_backend_lib::room::RoomPolicy;
use pointing_common::{MemberId, RoomSnapshot, ServerToClient, VotingSystem};
use tokio::sync::mpsc;
use uuid::Uuid;

type Conn = mpsc::Receiver<ServerToClient>;

fn setup() -> (RoomRegistry, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let registry = RoomRegistry::new(
        Arc::new(clock.clone()),
        RoomPolicy::from(&Settings::default()),
    );
    (registry, clock)
}

async fn join(
    registry: &RoomRegistry,
    room_id: &str,
    name: &str,
    request_admin: bool,
) -> (MemberId, Conn, Result<(), JoinError>) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(32);
    let result = registry.join(room_id, id, name, request_admin, tx).await;
    (id, rx, result)
}

async fn recv_update(rx: &mut Conn) -> RoomSnapshot {
    match rx.recv().await.expect("connection channel open") {
        ServerToClient::RoomUpdate { room } => room,
        other => panic!("Expected RoomUpdate, got {other:?}"),
    }
}

/// Round-trip the room actor so every fire-and-forget command sent before the
/// flush has been processed. A removal request from a random non-member is
/// silently ignored and changes nothing.
async fn flush(registry: &RoomRegistry, room_id: &str) {
    registry
        .remove_member(room_id, Uuid::new_v4(), Uuid::new_v4())
        .await;
}

fn member_vote<'a>(room: &'a RoomSnapshot, id: MemberId) -> Option<&'a str> {
    room.members
        .iter()
        .find(|m| m.id == id)
        .and_then(|m| m.vote.as_deref())
}

#[tokio::test]
async fn test_full_estimation_round() {
    let (registry, _clock) = setup();

    // empty room: first joiner claims admin
    let (alice, mut alice_rx, result) = join(&registry, "R1", "Alice", true).await;
    result.unwrap();
    let room = recv_update(&mut alice_rx).await;
    assert_eq!(room.admin_id, Some(alice));

    // second admin request fails and Bob is not added
    let (bob_rejected, mut rejected_rx, result) = join(&registry, "R1", "Bob", true).await;
    assert_eq!(result.unwrap_err(), JoinError::AdminTaken);

    // a vote from someone who never joined is ignored: no state, no broadcast
    registry.cast_vote("R1", bob_rejected, "8".to_string());
    flush(&registry, "R1").await;
    assert!(alice_rx.try_recv().is_err());
    assert!(rejected_rx.try_recv().is_err());

    // Bob joins without requesting admin
    let (bob, mut bob_rx, result) = join(&registry, "R1", "Bob", false).await;
    result.unwrap();
    let room = recv_update(&mut alice_rx).await;
    assert_eq!(room.members.len(), 2);
    assert_eq!(room.admin_id, Some(alice));
    let _ = recv_update(&mut bob_rx).await;

    // both cast votes; state stays hidden
    registry.cast_vote("R1", alice, "5".to_string());
    registry.cast_vote("R1", bob, "8".to_string());
    let _ = recv_update(&mut alice_rx).await;
    let room = recv_update(&mut alice_rx).await;
    assert!(!room.revealed);
    assert_eq!(member_vote(&room, alice), Some("5"));
    assert_eq!(member_vote(&room, bob), Some("8"));

    // non-admin reveal is ignored entirely
    registry.reveal("R1", bob);
    flush(&registry, "R1").await;
    let _ = recv_update(&mut bob_rx).await; // bob's two vote broadcasts
    let _ = recv_update(&mut bob_rx).await;
    assert!(alice_rx.try_recv().is_err());
    assert!(bob_rx.try_recv().is_err());

    // admin reveal flips the room to revealed with votes as cast
    registry.reveal("R1", alice);
    let room = recv_update(&mut alice_rx).await;
    assert!(room.revealed);
    assert_eq!(member_vote(&room, alice), Some("5"));
    assert_eq!(member_vote(&room, bob), Some("8"));
    assert_eq!(recv_update(&mut bob_rx).await, room);
}

#[tokio::test]
async fn test_change_voting_system_clears_votes() {
    let (registry, _clock) = setup();

    let (alice, mut alice_rx, result) = join(&registry, "R2", "Alice", true).await;
    result.unwrap();
    let (bob, mut bob_rx, result) = join(&registry, "R2", "Bob", false).await;
    result.unwrap();

    registry.cast_vote("R2", alice, "13".to_string());
    registry.cast_vote("R2", bob, "21".to_string());

    // non-admin system change is ignored
    registry.change_voting_system("R2", bob, VotingSystem::Tshirt);
    // admin system change switches scale, clears votes, forces collecting
    registry.change_voting_system("R2", alice, VotingSystem::Tshirt);

    // alice: own join, bob join, two votes, then the system change
    for _ in 0..4 {
        let _ = recv_update(&mut alice_rx).await;
    }
    let room = recv_update(&mut alice_rx).await;
    assert_eq!(room.voting_system, VotingSystem::Tshirt);
    assert!(!room.revealed);
    assert!(room.members.iter().all(|m| m.vote.is_none()));

    // old-scale values are now rejected, new-scale values accepted
    registry.cast_vote("R2", bob, "13".to_string());
    registry.cast_vote("R2", bob, "XL".to_string());
    flush(&registry, "R2").await;
    for _ in 0..4 {
        let _ = recv_update(&mut bob_rx).await;
    }
    let room = recv_update(&mut bob_rx).await;
    assert_eq!(member_vote(&room, bob), Some("XL"));
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_kick_notifies_target_and_rebroadcasts() {
    let (registry, _clock) = setup();

    let (alice, mut alice_rx, result) = join(&registry, "R3", "Alice", true).await;
    result.unwrap();
    let (bob, mut bob_rx, result) = join(&registry, "R3", "Bob", false).await;
    result.unwrap();

    registry.remove_member("R3", alice, bob).await;

    // target gets the dedicated signal after its own join update
    let _ = recv_update(&mut bob_rx).await;
    assert_eq!(bob_rx.recv().await, Some(ServerToClient::Kicked));

    // everyone else gets a snapshot without the target
    let _ = recv_update(&mut alice_rx).await;
    let _ = recv_update(&mut alice_rx).await;
    let room = recv_update(&mut alice_rx).await;
    assert_eq!(room.members.len(), 1);
    assert_eq!(room.members[0].id, alice);
    assert_eq!(room.admin_id, Some(alice));
}

#[tokio::test]
async fn test_admin_disconnect_clears_slot_only() {
    let (registry, _clock) = setup();

    let (alice, _alice_rx, result) = join(&registry, "R4", "Alice", true).await;
    result.unwrap();
    let (bob, mut bob_rx, result) = join(&registry, "R4", "Bob", false).await;
    result.unwrap();

    registry.leave("R4", alice).await;

    let _ = recv_update(&mut bob_rx).await;
    let room = recv_update(&mut bob_rx).await;
    assert_eq!(room.admin_id, None);
    assert_eq!(room.members.len(), 1);
    assert_eq!(room.members[0].id, bob);
    assert_eq!(registry.room_count(), 1);

    // the freed slot is claimable
    let (carol, mut carol_rx, result) = join(&registry, "R4", "Carol", true).await;
    result.unwrap();
    let room = recv_update(&mut carol_rx).await;
    assert_eq!(room.admin_id, Some(carol));
}

#[tokio::test]
async fn test_last_leave_destroys_room_and_rejoin_is_fresh() {
    let (registry, _clock) = setup();

    let (alice, _alice_rx, result) = join(&registry, "R5", "Alice", true).await;
    result.unwrap();
    registry.reveal("R5", alice);

    registry.leave("R5", alice).await;
    assert_eq!(registry.room_count(), 0);

    // recreated from scratch: collecting, fibonacci, no admin carried over
    let (bob, mut bob_rx, result) = join(&registry, "R5", "Bob", false).await;
    result.unwrap();
    let room = recv_update(&mut bob_rx).await;
    assert_eq!(room.members.len(), 1);
    assert_eq!(room.members[0].id, bob);
    assert!(!room.revealed);
    assert_eq!(room.voting_system, VotingSystem::Fibonacci);
    assert_eq!(room.admin_id, None);
    assert_eq!(registry.room_count(), 1);
}

#[tokio::test]
async fn test_admin_removing_last_member_destroys_room() {
    let (registry, _clock) = setup();

    let (alice, mut alice_rx, result) = join(&registry, "R6", "Alice", true).await;
    result.unwrap();

    registry.remove_member("R6", alice, alice).await;
    assert_eq!(registry.room_count(), 0);

    let _ = recv_update(&mut alice_rx).await; // join broadcast
    assert_eq!(alice_rx.recv().await, Some(ServerToClient::Kicked));
}

#[tokio::test]
async fn test_stale_admin_reset_after_24_hours() {
    let (registry, clock) = setup();

    let (alice, mut alice_rx, result) = join(&registry, "R7", "Alice", true).await;
    result.unwrap();
    let (carol, _carol_rx, result) = join(&registry, "R7", "Carol", false).await;
    result.unwrap();

    // Carol stays active inside the window, Alice goes quiet
    clock.advance(Duration::hours(23));
    registry.cast_vote("R7", carol, "3".to_string());
    flush(&registry, "R7").await;
    clock.advance(Duration::hours(2));

    // join past the window frees the admin slot and purges abandoned members
    let (bob, mut bob_rx, result) = join(&registry, "R7", "Bob", true).await;
    result.unwrap();

    let room = recv_update(&mut bob_rx).await;
    assert_eq!(room.admin_id, Some(bob));
    assert!(room.members.iter().all(|m| m.id != alice), "stale admin purged");
    assert!(room.members.iter().any(|m| m.id == carol), "active member kept");

    // Alice's connection is no longer subscribed either
    registry.cast_vote("R7", bob, "5".to_string());
    flush(&registry, "R7").await;
    let _ = recv_update(&mut alice_rx).await; // own join
    let _ = recv_update(&mut alice_rx).await; // carol join
    let _ = recv_update(&mut alice_rx).await; // carol vote
    assert!(alice_rx.try_recv().is_err());
}
