//! Roster - idempotent group membership
//!
//! Registers peers into named groups (teams, board sides). Registration is
//! insert-if-absent: calling it again with the same peer is a no-op, which
//! makes it safe to re-run on every reconnect, role push, or snapshot
//! apply without clobbering an existing display name.
//!
//! The roster deliberately does not enforce cross-group exclusivity or
//! capacity limits; the caller owns the "one group per peer" rule and can
//! lean on [`Roster::group_of`] to check it before a second registration.

use indexmap::IndexMap;
use roomsync_core::{GroupId, PeerId};
use serde::{Deserialize, Serialize};

/// Peer-to-display-name maps keyed by group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    groups: IndexMap<GroupId, IndexMap<PeerId, String>>,
}

impl Roster {
    /// Create an empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer in a group, if not already present
    ///
    /// Never overwrites an existing entry. Returns whether an insert
    /// actually happened.
    pub fn ensure_member(
        &mut self,
        group: GroupId,
        peer: PeerId,
        display_name: impl Into<String>,
    ) -> bool {
        let members = self.groups.entry(group).or_default();
        if members.contains_key(&peer) {
            return false;
        }
        members.insert(peer, display_name.into());
        true
    }

    /// Members of a group, if the group exists
    pub fn members(&self, group: &GroupId) -> Option<&IndexMap<PeerId, String>> {
        self.groups.get(group)
    }

    /// Whether a peer is registered in a group
    pub fn is_member(&self, group: &GroupId, peer: &PeerId) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains_key(peer))
    }

    /// The first group containing the peer, in insertion order
    ///
    /// The caller-side hook for the "one group per peer" check.
    pub fn group_of(&self, peer: &PeerId) -> Option<&GroupId> {
        self.groups
            .iter()
            .find(|(_, members)| members.contains_key(peer))
            .map(|(group, _)| group)
    }

    /// Display name of a peer in a group
    pub fn display_name(&self, group: &GroupId, peer: &PeerId) -> Option<&str> {
        self.groups
            .get(group)?
            .get(peer)
            .map(String::as_str)
    }

    /// All known groups, in insertion order
    pub fn groups(&self) -> impl Iterator<Item = &GroupId> {
        self.groups.keys()
    }

    /// Total members across all groups (a peer in two groups counts twice)
    pub fn member_count(&self) -> usize {
        self.groups.values().map(IndexMap::len).sum()
    }
}
