// ============================
// pointing-backend-lib/src/error.rs
// ============================
//! Central error types.
//!
//! `JoinError::AdminTaken` is the only error a client ever sees; its `Display`
//! text is the `joinError` payload. Everything else here is internal plumbing.
//! Unauthorized or nonsensical requests are not errors at all: they are
//! silently ignored with no state change and no broadcast.

use thiserror::Error;

/// Join rejections surfaced to the requesting client.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("Admin role is already taken for this room")]
    AdminTaken,
}

/// Internal application errors. None of these are fatal to the process.
#[derive(Error, Debug)]
pub enum AppError {
    /// The room actor stopped accepting joins because its last member left.
    /// The registry retries against a freshly created room.
    #[error("room is closed")]
    RoomClosed,

    #[error("room reply channel dropped")]
    ChannelClosed,

    #[error(transparent)]
    Join(#[from] JoinError),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AppError::ChannelClosed
    }
}
