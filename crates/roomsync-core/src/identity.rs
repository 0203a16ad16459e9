//! Identity types for peers, rooms, and roster groups

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for one connected peer
///
/// The host environment persists this across reconnects so roster
/// membership and predicted-entity ownership survive a refresh. Ordered so
/// that tied ownership claims resolve the same way on every peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Create a new peer ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One shared session, keyed by PIN and mode
///
/// PINs are issued by an external collaborator; the mode string keeps two
/// different tools sharing one PIN namespace out of each other's rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId {
    /// Session PIN issued externally
    pub pin: String,
    /// Which game/tool this room belongs to (e.g. "line", "memedash")
    pub mode: String,
}

impl RoomId {
    /// Create a new room ID
    pub fn new(pin: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            mode: mode.into(),
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room:{}:{}", self.pin, self.mode)
    }
}

/// Identifier for a roster group (a team, a side of a board)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    /// Create a new group ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
