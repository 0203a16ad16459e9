//! Transport contract and wire messages
//!
//! The engine consumes a room-scoped pub/sub primitive and never implements
//! one. Delivery between independent publishes is at-most-once and
//! unordered; everything downstream (field-granular merges, idempotent
//! reapplication, epoch-fenced ownership) is designed so reordering and
//! duplication are harmless.
//!
//! Outbound traffic goes through the [`Transport`] trait. Inbound traffic
//! is pushed by the host into `SessionClient::handle` as
//! [`TransportEvent`]s; the engine is single-threaded and event-driven,
//! so there is no inbound polling loop to own.

use crate::arbiter::OwnershipClaim;
use crate::input_relay::InputSample;
use roomsync_core::{GroupId, PeerId, RoomId, Value};
use serde::{Deserialize, Serialize};

/// Full-snapshot broadcast (`state` reply and `state_update` fan-out share
/// this shape; which one it was arrives as the event variant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Which room this snapshot belongs to
    pub room: RoomId,
    /// The peer that published it
    pub origin: PeerId,
    /// The publisher's view of room ownership
    pub ownership: OwnershipClaim,
    /// The full shared-state snapshot
    pub state: Value,
}

/// Transient control-state broadcast, edge-triggered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputUpdate {
    /// Which room this sample belongs to
    pub room: RoomId,
    /// The peer whose controls these are
    pub origin: PeerId,
    /// The control sample itself
    pub sample: InputSample,
}

/// Periodic room occupancy notification
///
/// Carries the member list, not just a count, so the input relay can drop
/// samples from peers that have left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Which room
    pub room: RoomId,
    /// Number of joined peers
    pub count: usize,
    /// Currently joined peers
    pub peers: Vec<PeerId>,
}

/// Server-assigned group/team pushed to a specific peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleUpdate {
    /// Which room
    pub room: RoomId,
    /// The group this peer was assigned to
    pub group: GroupId,
}

/// Inbound transport traffic, pushed into the session by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// Channel came up (or back up)
    Connected,
    /// Channel went down; the session keeps running locally
    Disconnected,
    /// Direct reply to `request_state` with the current snapshot
    StateReply(StateUpdate),
    /// Fan-out snapshot broadcast from another room member
    StateBroadcast(StateUpdate),
    /// Control-state sample from another room member
    Input(InputUpdate),
    /// Room occupancy changed
    Presence(PresenceUpdate),
    /// The server assigned this peer to a group
    RoleAssigned(RoleUpdate),
}

/// Outbound pub/sub operations the engine requires from the environment
///
/// Implementations wrap whatever the host actually speaks (a websocket, a
/// Socket.IO bridge, an in-memory bus in tests). All methods are
/// fire-and-forget at the protocol level; `Err` means the publish could
/// not even be attempted.
pub trait Transport {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Join a room (start receiving its traffic)
    fn join(&mut self, room: &RoomId) -> Result<(), Self::Error>;

    /// Leave a room
    fn leave(&mut self, room: &RoomId) -> Result<(), Self::Error>;

    /// Ask current members for the existing snapshot, if any
    fn request_state(&mut self, room: &RoomId) -> Result<(), Self::Error>;

    /// Broadcast a full snapshot to the other room members
    fn publish_state(&mut self, room: &RoomId, update: &StateUpdate) -> Result<(), Self::Error>;

    /// Broadcast a control sample to the other room members
    fn publish_input(&mut self, room: &RoomId, update: &InputUpdate) -> Result<(), Self::Error>;
}

/// External session-PIN issuance (`GET /new-session?mode=`)
///
/// Not part of the replication core: hosts that were not handed a PIN via
/// a shareable link call this once at startup, then construct the
/// [`RoomId`] themselves.
pub trait PinIssuer {
    /// Error type for this issuer
    type Error: std::error::Error + Send + Sync + 'static;

    /// Obtain a fresh session PIN for the given mode
    fn new_session(&self, mode: &str) -> Result<String, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_update_round_trip() {
        let update = StateUpdate {
            room: RoomId::new("4821", "line"),
            origin: PeerId::new("p1"),
            ownership: OwnershipClaim::new(PeerId::new("p1"), 1),
            state: Value::map(),
        };
        let text = serde_json::to_string(&update).unwrap();
        let back: StateUpdate = serde_json::from_str(&text).unwrap();
        assert_eq!(back, update);
    }

    #[test]
    fn test_presence_carries_members() {
        let presence = PresenceUpdate {
            room: RoomId::new("4821", "line"),
            count: 2,
            peers: vec![PeerId::new("p1"), PeerId::new("p2")],
        };
        let text = serde_json::to_string(&presence).unwrap();
        let back: PresenceUpdate = serde_json::from_str(&text).unwrap();
        assert_eq!(back.peers.len(), 2);
    }
}
