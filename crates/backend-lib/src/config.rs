// ============================
// pointing-backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level
    pub log_level: String,
    /// Seconds between forced admin-slot resets for a room
    pub admin_reset_secs: u64,
    /// Seconds of inactivity after which a member counts as abandoned
    pub inactive_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".parse().expect("static addr"),
            log_level: "info".to_string(),
            admin_reset_secs: 60 * 60 * 24,
            inactive_timeout_secs: 60 * 60 * 24,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` merged with `POINTING_`-prefixed
    /// environment variables. Missing files fall back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load settings with an explicit config file path.
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("POINTING_"))
            .extract()?;
        Ok(settings)
    }
}
