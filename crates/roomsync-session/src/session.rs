//! SessionClient - one peer's view of one shared room
//!
//! Instance-scoped orchestrator tying the components together: ownership
//! arbitration, the replicated snapshot, edit guarding, the input relay,
//! and the roster. One process can run any number of clients for any
//! number of rooms; nothing here is global.
//!
//! # Control flow
//!
//! ```text
//! connect ──▶ join + request_state ──▶ bootstrap grace window
//!                │                          │ no snapshot arrived
//!                ▼                          ▼
//!          snapshot arrives            self-seed, claim ownership
//!                │                          │
//!                ▼                          ▼
//!   every tick: replica ──────────── every tick: owner
//!     predict own entity               consume input frame
//!     publish input edges              advance simulation
//!     watch for owner silence          debounced broadcast
//! ```
//!
//! Inbound traffic is pushed through [`SessionClient::handle`]; the host
//! calls [`SessionClient::tick`] on its frame timer with current controls.

use crate::arbiter::{ClaimOutcome, OwnershipArbiter, OwnershipClaim};
use crate::edit_guard::EditGuard;
use crate::input_relay::{Controls, InputFrame, InputRelay, InputSample};
use crate::replicator::{PredictedEntity, StateReplicator};
use crate::roster::Roster;
use crate::transport::{InputUpdate, StateUpdate, Transport, TransportEvent};
use crate::{Error, Result, SessionConfig};
use roomsync_core::{FieldPath, GroupId, Millis, PeerId, RoomId, Value};

/// Mode-specific simulation rules, supplied by the host
///
/// The engine owns *when* to simulate (owner every tick, replica only its
/// own entity); the simulator owns *what* that means for the payload.
pub trait Simulator {
    /// Default shared state for bootstrap self-seeding
    fn seed(&self) -> Value;

    /// Owner-side step: advance the whole room one tick, consuming the
    /// latest control sample per peer
    fn advance(&mut self, state: &mut Value, inputs: &InputFrame, dt: Millis);

    /// Replica-side step: advance only the local peer's entity from its
    /// own controls (zero-latency self-control)
    fn predict_local(&mut self, state: &mut Value, controls: &Controls, dt: Millis);

    /// Which subtree the local peer predicts for itself
    ///
    /// `None` for surfaces with no predicted entity (pure editors), which
    /// makes reconciliation adopt remote snapshots wholesale apart from
    /// edit-guarded fields.
    fn predicted_entity(&self, local: &PeerId) -> Option<PredictedEntity> {
        let _ = local;
        None
    }
}

/// Current room occupancy as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presence {
    /// Whether the transport is reachable at all
    pub online: bool,
    /// Peers currently joined (including us), per the last report
    pub count: usize,
}

/// One peer's replication client for one room
pub struct SessionClient<T: Transport, S: Simulator> {
    config: SessionConfig,
    room: RoomId,
    local: PeerId,
    display_name: String,
    transport: T,
    simulator: S,
    arbiter: OwnershipArbiter,
    replicator: StateReplicator,
    guard: EditGuard,
    relay: InputRelay,
    roster: Roster,
    bootstrap_deadline: Option<Millis>,
    presence: Presence,
    local_only: bool,
}

impl<T: Transport, S: Simulator> SessionClient<T, S> {
    /// Create a client; call [`connect`](Self::connect) before ticking
    pub fn new(
        config: SessionConfig,
        room: RoomId,
        local: PeerId,
        display_name: impl Into<String>,
        transport: T,
        simulator: S,
    ) -> Self {
        let arbiter = OwnershipArbiter::new(local.clone(), config.owner_timeout);
        let replicator = StateReplicator::new(config.broadcast_debounce);
        let guard = EditGuard::new(config.edit_freshness);
        Self {
            config,
            room,
            local,
            display_name: display_name.into(),
            transport,
            simulator,
            arbiter,
            replicator,
            guard,
            relay: InputRelay::new(),
            roster: Roster::new(),
            bootstrap_deadline: None,
            presence: Presence::default(),
            local_only: false,
        }
    }

    /// Join the room and ask for the existing snapshot
    ///
    /// Arms the bootstrap grace window; if no snapshot arrives before it
    /// elapses, the next tick self-seeds and claims ownership. A transport
    /// failure here switches to local-only mode (seed immediately, never
    /// publish) and reports the failure.
    pub fn connect(&mut self, now: Millis) -> Result<()> {
        let joined = self
            .transport
            .join(&self.room)
            .and_then(|_| self.transport.request_state(&self.room));
        match joined {
            Ok(()) => {
                self.bootstrap_deadline = Some(now + self.config.bootstrap_grace);
                Ok(())
            }
            Err(err) => {
                log::warn!("transport unavailable, running local-only: {}", err);
                self.local_only = true;
                self.presence = Presence::default();
                self.seed_and_claim(now);
                Err(Error::Transport(err.to_string()))
            }
        }
    }

    /// Feed one inbound transport event into the session
    pub fn handle(&mut self, event: TransportEvent, now: Millis) {
        match event {
            TransportEvent::Connected => {
                self.presence = Presence {
                    online: true,
                    count: self.presence.count.max(1),
                };
            }
            TransportEvent::Disconnected => {
                self.presence = Presence::default();
            }
            TransportEvent::StateReply(update) | TransportEvent::StateBroadcast(update) => {
                if update.room != self.room || update.origin == self.local {
                    return;
                }
                if self.guard.is_editing(now) {
                    // Arbitrate the claim immediately so a live owner
                    // keeps counting as authority activity while the
                    // user types; only the state application waits for
                    // the idle gate. Malformed or stale-claim snapshots
                    // never enter the queue.
                    if update.state.as_map().is_some()
                        && self
                            .arbiter
                            .observe(&update.ownership, &update.origin, now)
                            .accepted()
                    {
                        self.guard.defer(update);
                    }
                    return;
                }
                self.apply_update(update, now);
            }
            TransportEvent::Input(update) => {
                if update.room != self.room || update.origin == self.local {
                    return;
                }
                self.relay.store(update.origin, update.sample);
            }
            TransportEvent::Presence(presence) => {
                if presence.room != self.room {
                    return;
                }
                self.presence = Presence {
                    online: true,
                    count: presence.count,
                };
                self.relay.retain_present(&presence.peers);
            }
            TransportEvent::RoleAssigned(role) => {
                if role.room != self.room {
                    return;
                }
                log::info!("assigned to group {}", role.group);
                self.roster.ensure_member(
                    role.group,
                    self.local.clone(),
                    self.display_name.clone(),
                );
            }
        }
    }

    /// Advance the session one frame
    ///
    /// `controls` is the local peer's current control levels; `dt` the
    /// simulated step. Returns a transport error if a due publish failed;
    /// the session itself stays consistent either way.
    pub fn tick(&mut self, controls: &Controls, now: Millis, dt: Millis) -> Result<()> {
        // Bootstrap: grace window elapsed with no snapshot.
        if let Some(deadline) = self.bootstrap_deadline {
            if now >= deadline {
                self.bootstrap_deadline = None;
                if !self.replicator.is_seeded() {
                    log::info!("no snapshot within grace window, self-seeding");
                    self.seed_and_claim(now);
                    self.publish_now()?;
                }
            }
        }

        // Release any snapshot the edit guard held back, now that the
        // user has gone idle.
        if let Some(update) = self.guard.poll(now) {
            self.apply_update(update, now);
        }

        // Failover: authority went silent past the timeout.
        if self.arbiter.check_failover(now).is_some() && self.replicator.is_seeded() {
            // Resume simulating from the last held snapshot.
            self.publish_now()?;
        }

        if self.arbiter.is_owner() {
            // Our own controls enter the frame like anyone else's.
            self.relay.store(
                self.local.clone(),
                InputSample {
                    controls: controls.clone(),
                    sent_at: now,
                },
            );
            if let Some(state) = self.replicator.snapshot_mut() {
                self.simulator.advance(state, self.relay.frame(), dt);
                self.replicator.schedule_broadcast(now);
            }
        } else if self.replicator.is_seeded() {
            if let Some(state) = self.replicator.snapshot_mut() {
                self.simulator.predict_local(state, controls, dt);
            }
            if let Some(sample) = self.relay.capture(controls, now) {
                self.publish_input(sample)?;
            }
        }

        // Trailing-edge broadcast once local mutation goes quiet.
        if self.replicator.poll_broadcast(now).is_some() {
            self.publish_now()?;
        }
        Ok(())
    }

    /// Apply a local edit to the shared snapshot
    ///
    /// Marks the field in the edit guard (remote overwrites of it defer
    /// until idle) and arms the outgoing debounce.
    pub fn edit(&mut self, path: FieldPath, value: Value, now: Millis) -> Result<()> {
        self.edit_with_idle(path, value, now, self.config.edit_idle)
    }

    /// Apply a local edit with a surface-specific idle delay
    ///
    /// Pointer drags warrant a longer gate than single keystrokes.
    pub fn edit_with_idle(
        &mut self,
        path: FieldPath,
        value: Value,
        now: Millis,
        idle_delay: Millis,
    ) -> Result<()> {
        let snapshot = self.replicator.snapshot_mut().ok_or(Error::NoSnapshot)?;
        snapshot.set_path(&path, value)?;
        self.guard.mark_edited(path, now, idle_delay);
        self.replicator.mark_dirty(now);
        Ok(())
    }

    /// Register the local peer in a roster group (insert-if-absent)
    ///
    /// Cross-group exclusivity stays with the caller; check
    /// [`group`](Self::group) first when one-group-per-peer matters.
    pub fn join_group(&mut self, group: GroupId) -> bool {
        self.roster
            .ensure_member(group, self.local.clone(), self.display_name.clone())
    }

    /// The first group the local peer is registered in
    pub fn group(&self) -> Option<&GroupId> {
        self.roster.group_of(&self.local)
    }

    /// The local peer's id
    pub fn peer(&self) -> &PeerId {
        &self.local
    }

    /// Whether the local peer currently owns the room
    pub fn is_owner(&self) -> bool {
        self.arbiter.is_owner()
    }

    /// The current ownership claim, if the room has been claimed
    pub fn ownership(&self) -> Option<&OwnershipClaim> {
        self.arbiter.claim()
    }

    /// The current local snapshot, if seeded
    pub fn state(&self) -> Option<&Value> {
        self.replicator.snapshot()
    }

    /// Current room occupancy
    pub fn presence(&self) -> Presence {
        self.presence
    }

    /// Whether the session degraded to local-only mode
    pub fn is_local_only(&self) -> bool {
        self.local_only
    }

    /// The roster of group memberships
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Access the transport (primarily for test buses and teardown)
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Leave the room and drop relay state
    pub fn leave(&mut self) -> Result<()> {
        self.relay.clear();
        self.replicator.cancel_broadcast();
        if self.local_only {
            return Ok(());
        }
        self.transport
            .leave(&self.room)
            .map_err(|err| Error::Transport(err.to_string()))
    }

    fn seed_and_claim(&mut self, now: Millis) {
        let seed = self.simulator.seed();
        if let Err(err) = self.replicator.adopt(seed) {
            // A simulator seeding a non-map is a host bug; degrade to an
            // empty room rather than running stateless.
            log::warn!("simulator seed rejected ({}), using empty map", err);
            let _ = self.replicator.adopt(Value::map());
        }
        self.arbiter.claim_local(now);
    }

    fn apply_update(&mut self, update: StateUpdate, now: Millis) {
        // Shape-check before arbitration: a malformed snapshot must not
        // install the sender's claim or consume the bootstrap grace
        // window on its way to being discarded.
        if update.state.as_map().is_none() {
            log::warn!(
                "discarding malformed snapshot from {}: root must be a map",
                update.origin
            );
            return;
        }

        let outcome = self
            .arbiter
            .observe(&update.ownership, &update.origin, now);
        if !outcome.accepted() {
            log::debug!("ignoring snapshot carrying stale claim from {}", update.origin);
            return;
        }

        let bootstrapping = self.bootstrap_deadline.is_some_and(|deadline| now <= deadline);
        if bootstrapping || outcome == ClaimOutcome::Demoted {
            // Bootstrap race or a winning foreign claim: the remote
            // snapshot is the converged truth, adopt it as-is. The grace
            // window stays armed until a snapshot actually lands.
            self.replicator.cancel_broadcast();
            match self.replicator.adopt(update.state) {
                Ok(()) => self.bootstrap_deadline = None,
                Err(err) => {
                    log::warn!(
                        "discarding malformed snapshot from {}: {}",
                        update.origin,
                        err
                    );
                }
            }
            return;
        }

        if self.arbiter.is_owner() {
            // Rule: the owner's locally simulated snapshot is
            // authoritative; foreign snapshots losing arbitration were
            // already dropped above, matching claims are echoes.
            log::debug!("owner ignoring snapshot from {}", update.origin);
            return;
        }

        let guarded = self.guard.fresh_paths(now);
        let predicted = self.simulator.predicted_entity(&self.local);
        match self.replicator.apply_remote(
            update.state,
            &guarded,
            predicted.as_ref(),
            self.config.snap_threshold,
        ) {
            Ok(applied) => {
                if applied.reintroduced_local_entity {
                    // The authority has not seen us yet; one rebroadcast
                    // makes the whole room learn about our entity.
                    self.replicator.mark_dirty(now);
                }
            }
            Err(err) => {
                log::warn!("discarding malformed snapshot from {}: {}", update.origin, err);
            }
        }
    }

    fn publish_now(&mut self) -> Result<()> {
        if self.local_only {
            return Ok(());
        }
        let (state, ownership) = match (self.replicator.snapshot(), self.arbiter.claim()) {
            (Some(state), Some(claim)) => (state.clone(), claim.clone()),
            _ => return Ok(()),
        };
        let update = StateUpdate {
            room: self.room.clone(),
            origin: self.local.clone(),
            ownership,
            state,
        };
        self.transport
            .publish_state(&self.room, &update)
            .map_err(|err| Error::Transport(err.to_string()))
    }

    fn publish_input(&mut self, sample: InputSample) -> Result<()> {
        if self.local_only {
            return Ok(());
        }
        let update = InputUpdate {
            room: self.room.clone(),
            origin: self.local.clone(),
            sample,
        };
        self.transport
            .publish_input(&self.room, &update)
            .map_err(|err| Error::Transport(err.to_string()))
    }
}
