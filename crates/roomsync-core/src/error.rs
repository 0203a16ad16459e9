//! Error types for roomsync-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    #[error("Path {path} expected {expected}, got {got}")]
    PathMismatch {
        path: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Path {path} index {index} out of range (len {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
