//! State replication - the local mirror and the reconciliation merge
//!
//! Each peer holds one local copy of the shared snapshot. Outgoing changes
//! coalesce through a trailing-edge debounce; incoming snapshots go
//! through a field-granular merge that decides, path by path, whether the
//! remote or the local value survives:
//!
//! - the local peer's own **predicted entity** keeps its locally simulated
//!   kinematics unless it has drifted past the snap threshold (then it
//!   snaps to the authoritative value, treating it as a teleport);
//! - fields under a fresh **edit lock** are restored from the local copy
//!   regardless of role;
//! - everything else adopts the remote value.
//!
//! The merge is surgical restores over an adopted copy, never a
//! whole-object overwrite of protected subtrees, which is what lets the
//! engine tolerate reordered and duplicated broadcasts: reapplying the
//! same snapshot with no intervening local change is a no-op.

use crate::{Error, Result};
use roomsync_core::{FieldPath, Millis, Value};
use serde::{Deserialize, Serialize};

/// The subtree a non-owner predicts for itself, and how to judge drift
///
/// `base` addresses the local peer's entity (e.g. `players.<peer-id>`).
/// `position` names the two numeric fields divergence is measured on;
/// `carried` lists the fields restored alongside them (velocities,
/// grounded flags, cosmetic fields the owner never simulates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedEntity {
    /// Root of the predicted subtree
    pub base: FieldPath,
    /// The (x, y) field names under `base`
    pub position: (String, String),
    /// Extra fields under `base` restored together with the position
    pub carried: Vec<String>,
}

impl PredictedEntity {
    /// Standard kinematic scope: position, velocity, grounded flag
    pub fn kinematic(base: FieldPath) -> Self {
        Self {
            base,
            position: ("x".to_string(), "y".to_string()),
            carried: vec![
                "vx".to_string(),
                "vy".to_string(),
                "grounded".to_string(),
            ],
        }
    }

    fn position_of(&self, snapshot: &Value) -> Option<(f64, f64)> {
        let x = snapshot
            .get_path(&self.base.child(self.position.0.clone()))?
            .as_float()?;
        let y = snapshot
            .get_path(&self.base.child(self.position.1.clone()))?
            .as_float()?;
        Some((x, y))
    }

    fn fields(&self) -> impl Iterator<Item = FieldPath> + '_ {
        [&self.position.0, &self.position.1]
            .into_iter()
            .chain(self.carried.iter())
            .map(|name| self.base.child(name.clone()))
    }
}

/// What a merge did, for the session's follow-up decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Applied {
    /// Local prediction was kept (divergence within the snap threshold)
    pub kept_prediction: bool,
    /// The remote snapshot lacked our entity; it was restored from the
    /// local copy and the caller should rebroadcast so others learn of it
    pub reintroduced_local_entity: bool,
}

/// The local snapshot mirror plus outgoing debounce state
#[derive(Debug)]
pub struct StateReplicator {
    local: Option<Value>,
    debounce: Millis,
    broadcast_deadline: Option<Millis>,
}

impl StateReplicator {
    /// Create a replicator with the given outgoing debounce window
    pub fn new(debounce: Millis) -> Self {
        Self {
            local: None,
            debounce,
            broadcast_deadline: None,
        }
    }

    /// The current local snapshot, if seeded
    pub fn snapshot(&self) -> Option<&Value> {
        self.local.as_ref()
    }

    /// Mutable access for local mutation (the session's edit surface)
    pub fn snapshot_mut(&mut self) -> Option<&mut Value> {
        self.local.as_mut()
    }

    /// Whether a snapshot is held yet
    pub fn is_seeded(&self) -> bool {
        self.local.is_some()
    }

    /// Record a local edit and (re)arm the trailing-edge debounce
    ///
    /// Every call pushes the deadline out; a burst of edits produces one
    /// publish once the burst goes quiet for the debounce window.
    pub fn mark_dirty(&mut self, now: Millis) {
        self.broadcast_deadline = Some(now + self.debounce);
    }

    /// Arm a broadcast without pushing an existing deadline out
    ///
    /// The owner mutates state every simulation tick; trailing-edge
    /// re-arming would starve its broadcasts entirely. This arms only
    /// when idle, which caps authoritative publishes at one per debounce
    /// window while continuous simulation runs.
    pub fn schedule_broadcast(&mut self, now: Millis) {
        if self.broadcast_deadline.is_none() {
            self.broadcast_deadline = Some(now + self.debounce);
        }
    }

    /// Whether a broadcast is pending (armed but not yet due)
    pub fn is_dirty(&self) -> bool {
        self.broadcast_deadline.is_some()
    }

    /// Take the snapshot to publish, once the debounce has gone quiet
    pub fn poll_broadcast(&mut self, now: Millis) -> Option<&Value> {
        match self.broadcast_deadline {
            Some(deadline) if now >= deadline => {
                self.broadcast_deadline = None;
                self.local.as_ref()
            }
            _ => None,
        }
    }

    /// Cancel any armed broadcast (room leave, demotion during bootstrap)
    pub fn cancel_broadcast(&mut self) {
        self.broadcast_deadline = None;
    }

    /// Adopt a snapshot wholesale
    ///
    /// Used for bootstrap seeding, for a remote seed arriving inside the
    /// bootstrap grace window, and for demotion by a winning claim.
    pub fn adopt(&mut self, snapshot: Value) -> Result<()> {
        validate(&snapshot)?;
        self.local = Some(snapshot);
        Ok(())
    }

    /// Reconcile a remote snapshot into the local mirror
    ///
    /// `guarded` holds the fresh edit-lock paths; `predicted` describes
    /// the local peer's own entity (None for owners and editor-only
    /// surfaces). The caller has already arbitrated ownership; a snapshot
    /// reaching this function has won the right to be merged.
    pub fn apply_remote(
        &mut self,
        remote: Value,
        guarded: &[FieldPath],
        predicted: Option<&PredictedEntity>,
        snap_threshold: f64,
    ) -> Result<Applied> {
        validate(&remote)?;
        let mut applied = Applied::default();

        let local = match &self.local {
            Some(local) => local.clone(),
            None => {
                // Nothing local to protect yet.
                self.local = Some(remote);
                return Ok(applied);
            }
        };

        let mut adopted = remote;

        if let Some(scope) = predicted {
            applied = restore_prediction(&local, &mut adopted, scope, snap_threshold)?;
        }

        for path in guarded {
            if let Some(value) = local.get_path(path) {
                // A shape mismatch means the remote restructured the
                // subtree; the guarded value has nowhere to go.
                if let Err(err) = adopted.set_path(path, value.clone()) {
                    log::debug!("edit-guarded path {} not restorable: {}", path, err);
                }
            }
        }

        self.local = Some(adopted);
        Ok(applied)
    }
}

/// Basic shape validation: a snapshot root must be a map
fn validate(snapshot: &Value) -> Result<()> {
    match snapshot {
        Value::Map(_) => Ok(()),
        other => Err(Error::MalformedSnapshot(format!(
            "snapshot root must be a map, got {}",
            other.type_name()
        ))),
    }
}

fn restore_prediction(
    local: &Value,
    adopted: &mut Value,
    scope: &PredictedEntity,
    snap_threshold: f64,
) -> Result<Applied> {
    let mut applied = Applied::default();

    let local_entity = match local.get_path(&scope.base) {
        Some(entity) => entity,
        // We are not in our own local snapshot either; nothing to keep.
        None => return Ok(applied),
    };

    if adopted.get_path(&scope.base).is_none() {
        // The authority does not know about us yet (it seeded the room
        // before our first broadcast). Keep our entity and ask the
        // session to rebroadcast.
        adopted.set_path(&scope.base, local_entity.clone())?;
        applied.reintroduced_local_entity = true;
        applied.kept_prediction = true;
        return Ok(applied);
    }

    let divergence = match (
        scope.position_of(local),
        scope.position_of(adopted),
    ) {
        (Some((lx, ly)), Some((rx, ry))) => ((lx - rx).powi(2) + (ly - ry).powi(2)).sqrt(),
        // Either side lacks a usable position; adopt the remote as-is.
        _ => return Ok(applied),
    };

    if divergence > snap_threshold {
        log::debug!(
            "prediction drifted {:.1} > {:.1}, snapping to authority",
            divergence,
            snap_threshold
        );
        return Ok(applied);
    }

    for path in scope.fields() {
        if let Some(value) = local.get_path(&path) {
            adopted.set_path(&path, value.clone())?;
        }
    }
    applied.kept_prediction = true;
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    fn player_state(x: f64, y: f64) -> Value {
        let mut root = Value::map();
        root.set_path(&path("players.me.x"), Value::Float(x)).unwrap();
        root.set_path(&path("players.me.y"), Value::Float(y)).unwrap();
        root.set_path(&path("players.me.vx"), Value::Float(1.0))
            .unwrap();
        root.set_path(&path("players.me.vy"), Value::Float(0.0))
            .unwrap();
        root.set_path(&path("round"), Value::Int(1)).unwrap();
        root
    }

    fn scope() -> PredictedEntity {
        PredictedEntity::kinematic(path("players.me"))
    }

    #[test]
    fn test_debounce_coalesces_bursts() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(Value::map()).unwrap();

        replicator.mark_dirty(0);
        replicator.mark_dirty(50);
        replicator.mark_dirty(100);

        // Still inside the trailing edge of the last mutation.
        assert!(replicator.poll_broadcast(150).is_none());
        // Quiet since t=100; due at t=220.
        assert!(replicator.poll_broadcast(220).is_some());
        // One publish per burst.
        assert!(replicator.poll_broadcast(300).is_none());
    }

    #[test]
    fn test_schedule_keeps_cadence_under_continuous_mutation() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(Value::map()).unwrap();

        // An owner scheduling every 16ms tick still publishes at the
        // debounce cadence instead of starving.
        let mut published = 0;
        for tick in 0..20u64 {
            let now = tick * 16;
            replicator.schedule_broadcast(now);
            if replicator.poll_broadcast(now).is_some() {
                published += 1;
            }
        }
        assert_eq!(published, 2); // due at t=120 (polled 128) and t=264 (polled 272)
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(player_state(0.0, 0.0)).unwrap();

        let err = replicator
            .apply_remote(Value::Int(7), &[], None, 80.0)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedSnapshot(_)));
        // Local snapshot untouched.
        assert!(replicator.snapshot().unwrap().get_path(&path("round")).is_some());
    }

    #[test]
    fn test_small_divergence_keeps_prediction() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(player_state(100.0, 100.0)).unwrap();

        // Authority says (140, 100): distance 40 <= 80, keep local.
        let applied = replicator
            .apply_remote(player_state(140.0, 100.0), &[], Some(&scope()), 80.0)
            .unwrap();
        assert!(applied.kept_prediction);
        let snapshot = replicator.snapshot().unwrap();
        assert_eq!(
            snapshot.get_path(&path("players.me.x")).unwrap().as_float(),
            Some(100.0)
        );
    }

    #[test]
    fn test_large_divergence_snaps_to_authority() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(player_state(100.0, 100.0)).unwrap();

        // Authority says (250, 100): distance 150 > 80, snap.
        let applied = replicator
            .apply_remote(player_state(250.0, 100.0), &[], Some(&scope()), 80.0)
            .unwrap();
        assert!(!applied.kept_prediction);
        let snapshot = replicator.snapshot().unwrap();
        assert_eq!(
            snapshot.get_path(&path("players.me.x")).unwrap().as_float(),
            Some(250.0)
        );
    }

    #[test]
    fn test_unpredicted_fields_always_adopt_remote() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(player_state(100.0, 100.0)).unwrap();

        let mut remote = player_state(110.0, 100.0);
        remote.set_path(&path("round"), Value::Int(2)).unwrap();
        replicator
            .apply_remote(remote, &[], Some(&scope()), 80.0)
            .unwrap();

        let snapshot = replicator.snapshot().unwrap();
        // Prediction kept...
        assert_eq!(
            snapshot.get_path(&path("players.me.x")).unwrap().as_float(),
            Some(100.0)
        );
        // ...but the rest of the room is the authority's.
        assert_eq!(
            snapshot.get_path(&path("round")).unwrap().as_int(),
            Some(2)
        );
    }

    #[test]
    fn test_missing_from_remote_reintroduces_entity() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(player_state(100.0, 100.0)).unwrap();

        // Authority seeded the room without us.
        let mut remote = Value::map();
        remote.set_path(&path("round"), Value::Int(3)).unwrap();
        let applied = replicator
            .apply_remote(remote, &[], Some(&scope()), 80.0)
            .unwrap();

        assert!(applied.reintroduced_local_entity);
        let snapshot = replicator.snapshot().unwrap();
        assert_eq!(
            snapshot.get_path(&path("players.me.x")).unwrap().as_float(),
            Some(100.0)
        );
    }

    #[test]
    fn test_guarded_paths_restored_from_local() {
        let mut replicator = StateReplicator::new(120);
        let mut local = Value::map();
        local
            .set_path(&path("series"), Value::List(vec![Value::map()]))
            .unwrap();
        local
            .set_path(&path("series.0.label"), Value::from("my edit"))
            .unwrap();
        replicator.adopt(local).unwrap();

        let mut remote = Value::map();
        remote
            .set_path(&path("series"), Value::List(vec![Value::map()]))
            .unwrap();
        remote
            .set_path(&path("series.0.label"), Value::from("their edit"))
            .unwrap();
        remote
            .set_path(&path("series.0.color"), Value::from("#1e88e5"))
            .unwrap();

        replicator
            .apply_remote(remote, &[path("series.0.label")], None, 80.0)
            .unwrap();

        let snapshot = replicator.snapshot().unwrap();
        assert_eq!(
            snapshot
                .get_path(&path("series.0.label"))
                .and_then(Value::as_str),
            Some("my edit")
        );
        assert_eq!(
            snapshot
                .get_path(&path("series.0.color"))
                .and_then(Value::as_str),
            Some("#1e88e5")
        );
    }

    #[test]
    fn test_reapplying_same_snapshot_is_idempotent() {
        let mut replicator = StateReplicator::new(120);
        replicator.adopt(player_state(100.0, 100.0)).unwrap();

        let remote = player_state(110.0, 100.0);
        replicator
            .apply_remote(remote.clone(), &[], Some(&scope()), 80.0)
            .unwrap();
        let first = replicator.snapshot().unwrap().clone();

        replicator
            .apply_remote(remote, &[], Some(&scope()), 80.0)
            .unwrap();
        assert_eq!(replicator.snapshot().unwrap(), &first);
    }
}
