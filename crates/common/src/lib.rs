// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between the pointing client and server.
//! This module defines the WebSocket protocol messages and supporting types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-connection participant identifier.
pub type MemberId = Uuid;

/// Vote values accepted while a room uses the fibonacci scale.
pub const FIBONACCI_VALUES: &[&str] = &["1", "2", "3", "5", "8", "13", "21", "?"];

/// Vote values accepted while a room uses the t-shirt scale.
pub const TSHIRT_VALUES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", "?"];

/// The enumerated point scale governing valid vote values for a room.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VotingSystem {
    #[default]
    Fibonacci,
    Tshirt,
}

impl VotingSystem {
    /// The full vote-value domain of this scale.
    pub fn values(self) -> &'static [&'static str] {
        match self {
            VotingSystem::Fibonacci => FIBONACCI_VALUES,
            VotingSystem::Tshirt => TSHIRT_VALUES,
        }
    }

    /// Whether `vote` is inside this scale's domain.
    pub fn allows(self, vote: &str) -> bool {
        self.values().contains(&vote)
    }
}

/// Messages sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientToServer {
    /// Join a room, creating it if it does not exist yet
    /// # Fields
    /// * `room_id` - Shared id of the room to join
    /// * `member_name` - Display name for the joining participant
    /// * `request_admin` - Whether the joiner wants the (single) admin role
    JoinRoom {
        room_id: String,
        member_name: String,
        request_admin: bool,
    },
    /// Cast or change a vote
    /// # Fields
    /// * `room_id` - Room the vote belongs to
    /// * `vote` - Value from the room's current voting-system domain
    Vote { room_id: String, vote: String },
    /// Reveal all votes (admin only)
    Reveal { room_id: String },
    /// Clear all votes and return to collecting (admin only)
    Reset { room_id: String },
    /// Switch the point scale, clearing all votes (admin only)
    ChangeVotingSystem {
        room_id: String,
        system: VotingSystem,
    },
    /// Remove a participant from the room (admin only)
    RemoveMember {
        room_id: String,
        member_id: MemberId,
    },
}

/// Messages sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerToClient {
    /// Full room state, sent to every member after any mutation
    RoomUpdate { room: RoomSnapshot },
    /// Join rejection, sent only to the failed joiner
    JoinError { message: String },
    /// Forced-removal notice, sent only to the removed participant
    Kicked,
}

/// One participant as seen on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub id: MemberId,
    pub name: String,
    pub vote: Option<String>,
    pub is_admin: bool,
    /// Last state-changing action by this participant, epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_active_at: DateTime<Utc>,
}

/// The complete state of a room. Every mutation rebroadcasts this whole
/// structure; there are no delta updates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Participants in insertion order.
    pub members: Vec<MemberSnapshot>,
    pub revealed: bool,
    pub voting_system: VotingSystem,
    pub admin_id: Option<MemberId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_admin_reset_at: DateTime<Utc>,
}
