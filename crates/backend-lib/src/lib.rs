// ============================
// pointing-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the pointing WebSocket server.

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod room;
pub mod room_actor;
pub mod ws_router;

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::registry::RoomRegistry;
use crate::room::RoomPolicy;

/// Application state shared across all handlers
pub struct AppState {
    /// Room registry, keyed by room id
    pub rooms: RoomRegistry,
    /// Settings manager
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create a new application state with an explicit clock. Tests pass a
    /// `ManualClock` here so the periodic admin reset is deterministic.
    pub fn new(settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let policy = RoomPolicy::from(&settings);
        Self {
            rooms: RoomRegistry::new(clock, policy),
            settings: Arc::new(settings),
        }
    }

    /// Create a new application state on the system clock.
    pub fn new_default(settings: Settings) -> Self {
        Self::new(settings, Arc::new(SystemClock))
    }
}
