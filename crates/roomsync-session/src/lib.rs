//! Roomsync Session - shared-room state replication without a server authority
//!
//! This crate keeps several peers looking at one "shared room" in agreement
//! about a single mutable state blob, over an unreliable, ordering-agnostic
//! pub/sub transport, with no durable server-side authority:
//!
//! - **Ownership arbitration**: one peer at a time is the authority that
//!   advances simulation and publishes the canonical snapshot; claims are
//!   epoch-fenced and fail over when the owner goes quiet
//! - **State replication**: field-granular, idempotent reconciliation of
//!   full-snapshot broadcasts, with local prediction kept inside a snap
//!   threshold
//! - **Edit guarding**: remote overwrites of fields under active local
//!   edit are deferred until idle, never lost
//! - **Input relay**: edge-triggered control-state broadcast, consumed
//!   latest-per-peer by the owner, gated on presence
//! - **Roster**: idempotent team/group registration
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      SessionClient                         │
//! │  ┌────────────┐  ┌─────────────────┐  ┌────────────────┐  │
//! │  │ EditGuard  │─▶│ StateReplicator │◀─│ OwnershipArbiter│  │
//! │  └────────────┘  └─────────────────┘  └────────────────┘  │
//! │        │                  ▲                   ▲            │
//! │        ▼                  │                   │            │
//! │  ┌────────────┐  ┌─────────────────┐  ┌────────────────┐  │
//! │  │   Roster   │  │   InputRelay    │  │   Transport    │  │
//! │  └────────────┘  └─────────────────┘  └────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use roomsync_session::{SessionClient, SessionConfig, Simulator};
//!
//! let mut client = SessionClient::new(
//!     SessionConfig::default(),
//!     room,
//!     peer_id,
//!     "Alice",
//!     my_transport,
//!     my_simulator,
//! );
//! client.connect(now)?;
//!
//! // Host loop
//! loop {
//!     for event in poll_transport() {
//!         client.handle(event, now());
//!     }
//!     client.tick(&current_controls(), now(), dt)?;
//!     render(client.state());
//! }
//! ```

mod arbiter;
mod config;
mod edit_guard;
mod error;
mod input_relay;
mod replicator;
mod roster;
mod session;
mod transport;

pub use arbiter::{ClaimOutcome, OwnershipArbiter, OwnershipClaim};
pub use config::SessionConfig;
pub use edit_guard::EditGuard;
pub use error::{Error, Result};
pub use input_relay::{ControlValue, Controls, InputFrame, InputRelay, InputSample};
pub use replicator::{Applied, PredictedEntity, StateReplicator};
pub use roster::Roster;
pub use session::{Presence, SessionClient, Simulator};
pub use transport::{
    InputUpdate, PinIssuer, PresenceUpdate, RoleUpdate, StateUpdate, Transport, TransportEvent,
};

// Re-export core types for convenience
pub use roomsync_core::{FieldPath, GroupId, Millis, PeerId, RoomId, Segment, Value, ValueMap};
