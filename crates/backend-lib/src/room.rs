// ============================
// pointing-backend-lib/src/room.rs
// ============================
//! Room state: membership, admin arbitration and the voting state machine.
//!
//! A room moves between `Collecting` (revealed = false) and `Revealed`
//! (revealed = true). All mutating methods take `now` from the caller so time
//! stays testable; none of them touch a transport. Operations return whether
//! they changed anything — `false` means the caller must not broadcast.

use chrono::{DateTime, Duration, Utc};
use pointing_common::{MemberId, MemberSnapshot, RoomSnapshot, VotingSystem};

use crate::config::Settings;
use crate::error::JoinError;

/// Time limits governing the periodic admin/membership reset.
#[derive(Debug, Clone, Copy)]
pub struct RoomPolicy {
    /// How long an admin slot survives without a forced reset.
    pub admin_reset_interval: Duration,
    /// Idle time after which a member is treated as abandoned.
    pub inactive_timeout: Duration,
}

impl From<&Settings> for RoomPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            admin_reset_interval: Duration::seconds(settings.admin_reset_secs as i64),
            inactive_timeout: Duration::seconds(settings.inactive_timeout_secs as i64),
        }
    }
}

/// One connected user within a room.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: MemberId,
    pub name: String,
    pub vote: Option<String>,
    pub is_admin: bool,
    pub last_active_at: DateTime<Utc>,
}

/// An isolated voting session. Owned by the registry's per-room actor; never
/// shared, so no interior locking.
#[derive(Debug)]
pub struct Room {
    members: Vec<Participant>,
    revealed: bool,
    voting_system: VotingSystem,
    admin_id: Option<MemberId>,
    last_admin_reset_at: DateTime<Utc>,
}

impl Room {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            members: Vec::new(),
            revealed: false,
            voting_system: VotingSystem::Fibonacci,
            admin_id: None,
            last_admin_reset_at: now,
        }
    }

    /// Add a participant.
    ///
    /// Requesting admin while the slot is held fails with `AdminTaken` and the
    /// caller is not added. A successful admin request claims the slot.
    pub fn join(
        &mut self,
        id: MemberId,
        name: String,
        request_admin: bool,
        now: DateTime<Utc>,
        policy: &RoomPolicy,
    ) -> Result<(), JoinError> {
        self.expire_stale_admin(now, policy);

        if request_admin && self.admin_id.is_some() {
            return Err(JoinError::AdminTaken);
        }

        let is_admin = request_admin && self.admin_id.is_none();
        if is_admin {
            self.admin_id = Some(id);
        }

        self.members.push(Participant {
            id,
            name,
            vote: None,
            is_admin,
            last_active_at: now,
        });

        Ok(())
    }

    /// Drop a participant, clearing the admin slot if it was theirs.
    /// Returns whether anyone was removed.
    pub fn remove(&mut self, id: MemberId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.id != id);
        let removed = self.members.len() != before;
        if removed && self.admin_id == Some(id) {
            self.admin_id = None;
        }
        removed
    }

    /// Admin-initiated removal of `target`. Ignored unless `requester` holds
    /// the admin slot; the requester counts as active when it succeeds.
    pub fn remove_member(
        &mut self,
        requester: MemberId,
        target: MemberId,
        now: DateTime<Utc>,
    ) -> bool {
        if self.admin_id != Some(requester) {
            return false;
        }
        let removed = self.remove(target);
        if removed {
            self.touch(requester, now);
        }
        removed
    }

    /// Refresh a participant's liveness timestamp.
    pub fn touch(&mut self, id: MemberId, now: DateTime<Utc>) {
        if let Some(member) = self.member_mut(id) {
            member.last_active_at = now;
        }
    }

    /// Record a vote. Valid in either state and does not change `revealed`.
    /// Unknown members and values outside the current scale are ignored.
    pub fn vote(&mut self, id: MemberId, value: String, now: DateTime<Utc>) -> bool {
        if !self.voting_system.allows(&value) {
            return false;
        }
        match self.member_mut(id) {
            Some(member) => {
                member.vote = Some(value);
                member.last_active_at = now;
                true
            },
            None => false,
        }
    }

    /// Collecting -> Revealed. Admin only.
    pub fn reveal(&mut self, requester: MemberId, now: DateTime<Utc>) -> bool {
        if self.admin_id != Some(requester) {
            return false;
        }
        self.revealed = true;
        self.touch(requester, now);
        true
    }

    /// Clear every vote and return to Collecting. Admin only.
    pub fn reset(&mut self, requester: MemberId, now: DateTime<Utc>) -> bool {
        if self.admin_id != Some(requester) {
            return false;
        }
        self.clear_votes();
        self.touch(requester, now);
        true
    }

    /// Switch the point scale; implies a reset. Admin only.
    pub fn change_voting_system(
        &mut self,
        requester: MemberId,
        system: VotingSystem,
        now: DateTime<Utc>,
    ) -> bool {
        if self.admin_id != Some(requester) {
            return false;
        }
        self.voting_system = system;
        self.clear_votes();
        self.touch(requester, now);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn admin_id(&self) -> Option<MemberId> {
        self.admin_id
    }

    /// The complete room state, broadcast whole after every mutation.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            members: self
                .members
                .iter()
                .map(|m| MemberSnapshot {
                    id: m.id,
                    name: m.name.clone(),
                    vote: m.vote.clone(),
                    is_admin: m.is_admin,
                    last_active_at: m.last_active_at,
                })
                .collect(),
            revealed: self.revealed,
            voting_system: self.voting_system,
            admin_id: self.admin_id,
            last_admin_reset_at: self.last_admin_reset_at,
        }
    }

    fn clear_votes(&mut self) {
        self.revealed = false;
        for member in &mut self.members {
            member.vote = None;
        }
    }

    fn member_mut(&mut self, id: MemberId) -> Option<&mut Participant> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    /// Guard against a permanently stuck admin from a crashed or
    /// never-disconnected client: once per reset interval, vacate the admin
    /// slot and purge members idle longer than the inactive timeout.
    fn expire_stale_admin(&mut self, now: DateTime<Utc>, policy: &RoomPolicy) {
        if now - self.last_admin_reset_at <= policy.admin_reset_interval {
            return;
        }
        self.admin_id = None;
        for member in &mut self.members {
            member.is_admin = false;
        }
        self.members
            .retain(|m| now - m.last_active_at < policy.inactive_timeout);
        self.last_admin_reset_at = now;
    }
}
