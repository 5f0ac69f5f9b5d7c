// ==============
// pointing-backend-lib/src/metrics.rs
// ==============
//! Central place for metric keys
pub const WS_CONNECTIONS: &str = "ws.connections_total";
pub const WS_ACTIVE: &str = "ws.active";
pub const ROOM_CREATED: &str = "room.created_total";
pub const ROOM_REMOVED: &str = "room.removed_total";
pub const ROOM_JOINS: &str = "room.joins_total";
pub const ROOM_JOINS_REJECTED: &str = "room.joins_rejected_total";
pub const VOTES_CAST: &str = "room.votes_total";
