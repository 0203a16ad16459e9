//! Edit guarding - deferring remote overwrites of in-progress local edits
//!
//! Two protections layer together:
//! - a **session-wide idle gate**: while the user is actively editing
//!   (any field), incoming snapshots are queued instead of applied, and
//!   only the newest queued snapshot survives;
//! - **per-field freshness**: once the idle gate opens and a queued
//!   snapshot is reconciled, fields edited within the freshness window
//!   are still restored from the local copy, so a reordered or duplicated
//!   broadcast can never roll back what the user just typed.
//!
//! A remote update is never dropped here, only deferred: the latest one is
//! released to the replicator the moment the idle timer fires.

use crate::transport::StateUpdate;
use indexmap::IndexMap;
use roomsync_core::{FieldPath, Millis};

/// Per-field freshness tracking plus a deferral queue of depth one
#[derive(Debug)]
pub struct EditGuard {
    /// Last local edit time per field/subtree path
    marks: IndexMap<FieldPath, Millis>,
    /// Idle gate: armed (and re-armed) by every local edit
    idle_deadline: Option<Millis>,
    /// Newest remote update received while the gate was closed
    pending: Option<StateUpdate>,
    /// How long a mark protects its field during reconciliation
    freshness: Millis,
}

impl EditGuard {
    /// Create a guard with the given per-field freshness window
    pub fn new(freshness: Millis) -> Self {
        Self {
            marks: IndexMap::new(),
            idle_deadline: None,
            pending: None,
            freshness,
        }
    }

    /// Record a local edit and (re)arm the idle gate
    ///
    /// `idle_delay` is surface-dependent (a pointer drag warrants a longer
    /// gate than a single keystroke), so the caller passes it per edit.
    pub fn mark_edited(&mut self, path: FieldPath, now: Millis, idle_delay: Millis) {
        self.marks.insert(path, now);
        self.idle_deadline = Some(now + idle_delay);
        self.prune(now);
    }

    /// Whether the idle gate is currently closed
    pub fn is_editing(&self, now: Millis) -> bool {
        self.idle_deadline.is_some_and(|deadline| now < deadline)
    }

    /// Queue a remote update while editing; only the newest is retained
    pub fn defer(&mut self, update: StateUpdate) {
        if self.pending.is_some() {
            log::debug!("edit guard superseding queued snapshot");
        }
        self.pending = Some(update);
    }

    /// Release the queued update once the idle gate has opened
    ///
    /// Returns `None` while still editing or when nothing was deferred.
    /// Clears the gate on release so the next edit starts a fresh cycle.
    pub fn poll(&mut self, now: Millis) -> Option<StateUpdate> {
        if self.is_editing(now) {
            return None;
        }
        self.idle_deadline = None;
        self.pending.take()
    }

    /// Whether a remote write to `path` must be held off right now
    ///
    /// True when any fresh mark covers the path's subtree in either
    /// direction: a mark on `series.0` guards `series.0.label`, and a
    /// mark on `series.0.label` guards a wholesale write of `series.0`.
    pub fn is_guarded(&self, path: &FieldPath, now: Millis) -> bool {
        self.marks.iter().any(|(mark, edited_at)| {
            now.saturating_sub(*edited_at) < self.freshness
                && (path.starts_with(mark) || mark.starts_with(path))
        })
    }

    /// Paths with fresh marks, for the replicator's restore pass
    pub fn fresh_paths(&self, now: Millis) -> Vec<FieldPath> {
        self.marks
            .iter()
            .filter(|(_, edited_at)| now.saturating_sub(**edited_at) < self.freshness)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Drop marks that have aged out of the freshness window
    fn prune(&mut self, now: Millis) {
        let freshness = self.freshness;
        self.marks
            .retain(|_, edited_at| now.saturating_sub(*edited_at) < freshness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::OwnershipClaim;
    use roomsync_core::{PeerId, RoomId, Value};

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    fn update(tag: &str) -> StateUpdate {
        StateUpdate {
            room: RoomId::new("pin", "line"),
            origin: PeerId::new(tag),
            ownership: OwnershipClaim::new(PeerId::new(tag), 1),
            state: Value::map(),
        }
    }

    #[test]
    fn test_idle_gate_defers_and_releases() {
        let mut guard = EditGuard::new(1_500);
        guard.mark_edited(path("series.0.label"), 0, 1_500);

        assert!(guard.is_editing(200));
        guard.defer(update("a"));
        assert!(guard.poll(200).is_none());

        // Gate opens at t=1500; queued update comes out exactly once.
        let released = guard.poll(1_500).unwrap();
        assert_eq!(released.origin, PeerId::new("a"));
        assert!(guard.poll(1_600).is_none());
    }

    #[test]
    fn test_only_newest_deferred_update_survives() {
        let mut guard = EditGuard::new(1_500);
        guard.mark_edited(path("series.0.label"), 0, 500);
        guard.defer(update("first"));
        guard.defer(update("second"));

        let released = guard.poll(600).unwrap();
        assert_eq!(released.origin, PeerId::new("second"));
    }

    #[test]
    fn test_repeated_edits_rearm_gate() {
        let mut guard = EditGuard::new(1_500);
        guard.mark_edited(path("a"), 0, 500);
        guard.mark_edited(path("a"), 400, 500);
        guard.defer(update("a"));

        // Gate re-armed to t=900 by the second edit.
        assert!(guard.poll(600).is_none());
        assert!(guard.poll(900).is_some());
    }

    #[test]
    fn test_guarded_subtree_both_directions() {
        let mut guard = EditGuard::new(1_500);
        guard.mark_edited(path("series.0"), 0, 500);

        assert!(guard.is_guarded(&path("series.0.label"), 200));
        assert!(guard.is_guarded(&path("series"), 200));
        assert!(!guard.is_guarded(&path("axes.x"), 200));
        // Mark ages out after the freshness window.
        assert!(!guard.is_guarded(&path("series.0.label"), 1_500));
    }

    #[test]
    fn test_fresh_paths_prunes_stale_marks() {
        let mut guard = EditGuard::new(1_500);
        guard.mark_edited(path("a"), 0, 500);
        guard.mark_edited(path("b"), 2_000, 500);

        let fresh = guard.fresh_paths(2_100);
        assert_eq!(fresh, vec![path("b")]);
    }
}
