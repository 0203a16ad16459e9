//! Error types for roomsync-session
//!
//! The engine degrades rather than crashes: inbound-message problems
//! (malformed snapshots, stale input) are consumed at the point of
//! detection with a log line. `Error` only surfaces for outbound transport
//! failures and host-side misuse.

use thiserror::Error;

/// Session engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// A received snapshot failed shape validation and was discarded
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// The transport refused an outbound publish
    #[error("Transport error: {0}")]
    Transport(String),

    /// A field path failed to resolve against the local snapshot
    #[error(transparent)]
    Path(#[from] roomsync_core::Error),

    /// Operation requires a seeded snapshot
    #[error("No local snapshot yet (before bootstrap)")]
    NoSnapshot,
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;
