//! Ownership arbitration - one authoritative peer per room
//!
//! Every room has at most one owner: the peer advancing the simulation and
//! publishing the canonical snapshot. Ownership is claimed, not granted:
//! the first peer to see an empty room seeds state and claims it, and any
//! peer that watches the owner go silent past the timeout promotes itself.
//!
//! Claims carry a fencing epoch. A promotion bumps the epoch, and when two
//! peers promote simultaneously (both watched the same silence), the claim
//! with the higher epoch wins; equal epochs fall back to stable peer
//! ordering. Both claimants converge as soon as either observes the other,
//! which closes the transient dual-authority window an unfenced design
//! would leave open.

use roomsync_core::{Millis, PeerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fenced assertion of room ownership, carried on every state broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipClaim {
    /// The peer claiming to own the room
    pub owner: PeerId,
    /// Fencing token, bumped on every promotion
    pub epoch: u64,
}

impl OwnershipClaim {
    /// Create a new claim
    pub fn new(owner: PeerId, epoch: u64) -> Self {
        Self { owner, epoch }
    }

    /// Whether this claim wins against `other`
    ///
    /// Higher epoch wins outright; equal epochs are broken by peer
    /// ordering (the lexicographically smaller peer ID wins) so every
    /// peer resolves the same tie the same way.
    pub fn beats(&self, other: &OwnershipClaim) -> bool {
        match self.epoch.cmp(&other.epoch) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.owner < other.owner,
        }
    }
}

impl fmt::Display for OwnershipClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@e{}", self.owner, self.epoch)
    }
}

/// What `observe` decided about an incoming claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The incoming claim is (or matches) the current one; activity was
    /// refreshed if it came from the owner itself
    Current,
    /// The incoming claim replaced ours and demoted the local peer
    Demoted,
    /// The incoming claim replaced an older claim (local peer was not
    /// owner either way)
    Superseded,
    /// The incoming claim lost arbitration and should be ignored
    Stale,
}

impl ClaimOutcome {
    /// Whether a snapshot carrying this claim is acceptable as authority
    pub fn accepted(&self) -> bool {
        !matches!(self, ClaimOutcome::Stale)
    }
}

/// Tracks who owns the room and when the owner was last heard from
#[derive(Debug)]
pub struct OwnershipArbiter {
    local: PeerId,
    claim: Option<OwnershipClaim>,
    last_authority_activity: Millis,
    owner_timeout: Millis,
}

impl OwnershipArbiter {
    /// Create an arbiter for the given local peer
    pub fn new(local: PeerId, owner_timeout: Millis) -> Self {
        Self {
            local,
            claim: None,
            last_authority_activity: 0,
            owner_timeout,
        }
    }

    /// The current claim, if any peer has claimed the room
    pub fn claim(&self) -> Option<&OwnershipClaim> {
        self.claim.as_ref()
    }

    /// The current owner, if any
    pub fn owner(&self) -> Option<&PeerId> {
        self.claim.as_ref().map(|c| &c.owner)
    }

    /// Whether the local peer currently owns the room
    pub fn is_owner(&self) -> bool {
        self.owner() == Some(&self.local)
    }

    /// Claim the room for the local peer (bootstrap self-seed)
    ///
    /// Used when the bootstrap grace window elapsed with no snapshot:
    /// epoch starts at 1 so a seeded claim always beats "no claim".
    pub fn claim_local(&mut self, now: Millis) -> OwnershipClaim {
        let epoch = self.claim.as_ref().map_or(1, |c| c.epoch.max(1));
        let claim = OwnershipClaim::new(self.local.clone(), epoch);
        log::info!("claiming room ownership as {} (bootstrap)", claim);
        self.claim = Some(claim.clone());
        self.last_authority_activity = now;
        claim
    }

    /// Arbitrate an incoming claim from a state broadcast
    ///
    /// `origin` is the peer that published the broadcast, which is not
    /// necessarily the claimed owner (non-owners rebroadcast their own
    /// edits carrying the claim they believe in).
    pub fn observe(
        &mut self,
        incoming: &OwnershipClaim,
        origin: &PeerId,
        now: Millis,
    ) -> ClaimOutcome {
        let outcome = match &self.claim {
            None => {
                self.claim = Some(incoming.clone());
                ClaimOutcome::Superseded
            }
            Some(current) if incoming == current => ClaimOutcome::Current,
            Some(current) if incoming.beats(current) => {
                let was_owner = self.is_owner();
                log::info!("ownership {} superseded by {}", current, incoming);
                self.claim = Some(incoming.clone());
                if was_owner {
                    ClaimOutcome::Demoted
                } else {
                    ClaimOutcome::Superseded
                }
            }
            Some(_) => ClaimOutcome::Stale,
        };

        // Only traffic from the owner itself counts as authority activity.
        if outcome.accepted() && self.owner() == Some(origin) {
            self.last_authority_activity = now;
        }
        outcome
    }

    /// Failover check, run every tick
    ///
    /// Returns the new claim when the local peer just self-promoted:
    /// authority has been silent past the timeout and nobody else has
    /// produced a fresher claim. Owners never promote against themselves.
    pub fn check_failover(&mut self, now: Millis) -> Option<OwnershipClaim> {
        if self.is_owner() {
            return None;
        }
        let current = self.claim.as_ref()?;
        if now.saturating_sub(self.last_authority_activity) <= self.owner_timeout {
            return None;
        }
        let promoted = OwnershipClaim::new(self.local.clone(), current.epoch + 1);
        log::warn!(
            "owner {} silent for {}ms, promoting to {}",
            current,
            now.saturating_sub(self.last_authority_activity),
            promoted
        );
        self.claim = Some(promoted.clone());
        self.last_authority_activity = now;
        Some(promoted)
    }

    /// Milliseconds since the authority was last heard from
    pub fn authority_silence(&self, now: Millis) -> Millis {
        now.saturating_sub(self.last_authority_activity)
    }
}
