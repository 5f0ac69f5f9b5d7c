// ============================
// pointing-backend-lib/src/registry.rs
// ============================
//! Process-wide room registry.
//!
//! Rooms are created lazily on first join and removed once their last member
//! leaves; a subsequent join to the same id recreates the room fresh. Entries
//! are independent, so operations on different rooms never contend on the
//! same lock.

use std::sync::Arc;

use dashmap::DashMap;
use pointing_common::{MemberId, ServerToClient, VotingSystem};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{AppError, JoinError};
use crate::room::RoomPolicy;
use crate::room_actor::{spawn_room_actor, RoomHandle};

pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    clock: Arc<dyn Clock>,
    policy: RoomPolicy,
}

impl RoomRegistry {
    pub fn new(clock: Arc<dyn Clock>, policy: RoomPolicy) -> Self {
        Self {
            rooms: DashMap::new(),
            clock,
            policy,
        }
    }

    /// Join a room, creating it if needed. `tx` becomes the member's
    /// subscription channel on success and is never subscribed on failure.
    pub async fn join(
        &self,
        room_id: &str,
        id: MemberId,
        name: &str,
        request_admin: bool,
        tx: mpsc::Sender<ServerToClient>,
    ) -> Result<(), JoinError> {
        // A join can race the removal of a just-emptied room; the dead actor
        // answers `RoomClosed` and the retry lands on a fresh one.
        loop {
            let handle = self.get_or_create(room_id);
            match handle
                .join(id, name.to_string(), request_admin, tx.clone())
                .await
            {
                Ok(()) => {
                    metrics::counter!(crate::metrics::ROOM_JOINS).increment(1);
                    return Ok(());
                },
                Err(AppError::Join(err)) => {
                    metrics::counter!(crate::metrics::ROOM_JOINS_REJECTED).increment(1);
                    return Err(err);
                },
                Err(_) => {
                    self.remove_if_same(room_id, &handle);
                    continue;
                },
            }
        }
    }

    /// Remove a member after a transport disconnect.
    pub async fn leave(&self, room_id: &str, id: MemberId) {
        let Some(handle) = self.get(room_id) else {
            return;
        };
        if handle.leave(id).await {
            self.remove_if_same(room_id, &handle);
        }
    }

    pub fn cast_vote(&self, room_id: &str, id: MemberId, value: String) {
        if let Some(handle) = self.get(room_id) {
            handle.cast_vote(id, value);
        }
    }

    pub fn reveal(&self, room_id: &str, id: MemberId) {
        if let Some(handle) = self.get(room_id) {
            handle.reveal(id);
        }
    }

    pub fn reset(&self, room_id: &str, id: MemberId) {
        if let Some(handle) = self.get(room_id) {
            handle.reset(id);
        }
    }

    pub fn change_voting_system(&self, room_id: &str, id: MemberId, system: VotingSystem) {
        if let Some(handle) = self.get(room_id) {
            handle.change_voting_system(id, system);
        }
    }

    /// Admin-initiated removal; drops the room if the admin removed the last
    /// member (themselves included).
    pub async fn remove_member(&self, room_id: &str, requester: MemberId, target: MemberId) {
        let Some(handle) = self.get(room_id) else {
            return;
        };
        if handle.remove_member(requester, target).await {
            self.remove_if_same(room_id, &handle);
        }
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    fn get_or_create(&self, room_id: &str) -> RoomHandle {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room_id, "creating room");
                metrics::counter!(crate::metrics::ROOM_CREATED).increment(1);
                spawn_room_actor(room_id, Arc::clone(&self.clock), self.policy)
            })
            .clone()
    }

    /// Drop the registry entry, but only if it still points at `handle`; a
    /// concurrent join may already have recreated the room under the same id.
    fn remove_if_same(&self, room_id: &str, handle: &RoomHandle) {
        let removed = self
            .rooms
            .remove_if(room_id, |_, current| current.same_channel(handle));
        if removed.is_some() {
            debug!(room_id, "room empty, removed");
            metrics::counter!(crate::metrics::ROOM_REMOVED).increment(1);
        }
    }
}
