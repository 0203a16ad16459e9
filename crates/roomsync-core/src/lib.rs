//! Roomsync Core - Payload-agnostic data model for shared-room replication
//!
//! This crate provides the types the replication engine is generic over:
//! - Dynamic value trees (`Value`, `ValueMap`) holding any mode's snapshot
//! - Field paths (`FieldPath`) addressing individual fields for
//!   field-granular merges and edit locks
//! - Identity newtypes (`PeerId`, `RoomId`, `GroupId`)
//! - Millisecond time alias (`Millis`); the engine never reads a clock,
//!   the host passes "now" into every time-sensitive call

mod error;
mod identity;
mod path;
mod value;

pub use error::{Error, Result};
pub use identity::{GroupId, PeerId, RoomId};
pub use path::{FieldPath, Segment};
pub use value::{Value, ValueMap};

/// Host-supplied monotonic milliseconds
pub type Millis = u64;
