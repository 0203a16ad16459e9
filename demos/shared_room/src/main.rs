//! Shared Room Example
//!
//! Two peers join the same room over an in-memory bus. The first one in
//! seeds the state and claims ownership; the second adopts the existing
//! snapshot and runs as a replica with local prediction. The demo then
//! walks through input relay, edit guarding, and ownership failover.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use roomsync_core::{FieldPath, Millis, PeerId, RoomId, Value};
use roomsync_session::{
    ControlValue, Controls, InputFrame, InputUpdate, PredictedEntity, PresenceUpdate,
    SessionClient, SessionConfig, Simulator, StateUpdate, Transport, TransportEvent,
};

/// Shared bus state: one inbox per peer, plus the latest snapshot so that
/// `request_state` can be answered
#[derive(Default)]
struct Bus {
    inboxes: Vec<(PeerId, VecDeque<TransportEvent>)>,
    members: Vec<PeerId>,
    latest: Option<StateUpdate>,
}

impl Bus {
    fn inbox(&mut self, peer: &PeerId) -> &mut VecDeque<TransportEvent> {
        if let Some(pos) = self.inboxes.iter().position(|(p, _)| p == peer) {
            return &mut self.inboxes[pos].1;
        }
        self.inboxes.push((peer.clone(), VecDeque::new()));
        let last = self.inboxes.len() - 1;
        &mut self.inboxes[last].1
    }

    fn broadcast_presence(&mut self, room: &RoomId) {
        let update = PresenceUpdate {
            room: room.clone(),
            count: self.members.len(),
            peers: self.members.clone(),
        };
        let members = self.members.clone();
        for peer in &members {
            self.inbox(peer)
                .push_back(TransportEvent::Presence(update.clone()));
        }
    }

    fn fan_out(&mut self, origin: &PeerId, event: TransportEvent) {
        let members = self.members.clone();
        for peer in &members {
            if peer != origin {
                self.inbox(peer).push_back(event.clone());
            }
        }
    }
}

/// Per-peer handle onto the bus
struct BusTransport {
    peer: PeerId,
    bus: Rc<RefCell<Bus>>,
}

impl Transport for BusTransport {
    type Error = Infallible;

    fn join(&mut self, room: &RoomId) -> Result<(), Infallible> {
        let mut bus = self.bus.borrow_mut();
        if !bus.members.contains(&self.peer) {
            bus.members.push(self.peer.clone());
        }
        bus.inbox(&self.peer).push_back(TransportEvent::Connected);
        bus.broadcast_presence(room);
        Ok(())
    }

    fn leave(&mut self, room: &RoomId) -> Result<(), Infallible> {
        let mut bus = self.bus.borrow_mut();
        bus.members.retain(|p| p != &self.peer);
        bus.broadcast_presence(room);
        Ok(())
    }

    fn request_state(&mut self, _room: &RoomId) -> Result<(), Infallible> {
        let mut bus = self.bus.borrow_mut();
        if let Some(latest) = bus.latest.clone() {
            bus.inbox(&self.peer)
                .push_back(TransportEvent::StateReply(latest));
        }
        Ok(())
    }

    fn publish_state(&mut self, _room: &RoomId, update: &StateUpdate) -> Result<(), Infallible> {
        let mut bus = self.bus.borrow_mut();
        bus.latest = Some(update.clone());
        bus.fan_out(&self.peer, TransportEvent::StateBroadcast(update.clone()));
        Ok(())
    }

    fn publish_input(&mut self, _room: &RoomId, update: &InputUpdate) -> Result<(), Infallible> {
        self.bus
            .borrow_mut()
            .fan_out(&self.peer, TransportEvent::Input(update.clone()));
        Ok(())
    }
}

/// A runner that moves right when the `right` axis is held
struct RunnerSim {
    local: PeerId,
}

impl RunnerSim {
    fn axis(controls: &Controls) -> f64 {
        match controls.get("right") {
            Some(ControlValue::Axis(a)) => *a,
            Some(ControlValue::Button(true)) => 1.0,
            _ => 0.0,
        }
    }

    fn step(state: &mut Value, peer: &PeerId, axis: f64, dt: Millis) {
        let base: FieldPath = format!("players.{}", peer.as_str()).parse().unwrap();
        let x_path = base.child("x");
        let x = state.get_path(&x_path).and_then(Value::as_float).unwrap_or(0.0);
        let _ = state.set_path(&x_path, Value::Float(x + axis * dt as f64 * 0.25));
        let _ = state.set_path(&base.child("y"), Value::Float(0.0));
    }
}

impl Simulator for RunnerSim {
    fn seed(&self) -> Value {
        let mut state = Value::map();
        let _ = state.set_path(&"round".parse().unwrap(), Value::Int(1));
        let _ = state.set_path(&"hud.title".parse().unwrap(), Value::from("Shared Run"));
        state
    }

    fn advance(&mut self, state: &mut Value, inputs: &InputFrame, dt: Millis) {
        for (peer, sample) in inputs {
            Self::step(state, peer, Self::axis(&sample.controls), dt);
        }
    }

    fn predict_local(&mut self, state: &mut Value, controls: &Controls, dt: Millis) {
        let local = self.local.clone();
        Self::step(state, &local, Self::axis(controls), dt);
    }

    fn predicted_entity(&self, local: &PeerId) -> Option<PredictedEntity> {
        let base = format!("players.{}", local.as_str()).parse().ok()?;
        Some(PredictedEntity::kinematic(base))
    }
}

fn hold_right() -> Controls {
    let mut controls = Controls::new();
    controls.insert("right".to_string(), ControlValue::Axis(1.0));
    controls
}

fn idle() -> Controls {
    Controls::new()
}

type Client = SessionClient<BusTransport, RunnerSim>;

fn make_client(bus: &Rc<RefCell<Bus>>, room: &RoomId, id: &str, name: &str) -> Client {
    let peer = PeerId::new(id);
    let transport = BusTransport {
        peer: peer.clone(),
        bus: Rc::clone(bus),
    };
    let simulator = RunnerSim {
        local: peer.clone(),
    };
    SessionClient::new(
        SessionConfig::default(),
        room.clone(),
        peer,
        name,
        transport,
        simulator,
    )
}

/// Deliver every queued event to its client
fn pump(bus: &Rc<RefCell<Bus>>, clients: &mut [Client], now: Millis) {
    loop {
        let mut delivered = false;
        for client in clients.iter_mut() {
            let next = bus.borrow_mut().inbox(client.peer()).pop_front();
            if let Some(event) = next {
                client.handle(event, now);
                delivered = true;
            }
        }
        if !delivered {
            break;
        }
    }
}

fn player_x(client: &Client, id: &str) -> f64 {
    let path: FieldPath = format!("players.{id}.x").parse().unwrap();
    client
        .state()
        .and_then(|s| s.get_path(&path))
        .and_then(Value::as_float)
        .unwrap_or(0.0)
}

fn title(client: &Client) -> String {
    client
        .state()
        .and_then(|s| s.get_path(&"hud.title".parse().unwrap()))
        .and_then(Value::as_str)
        .unwrap_or("<unseeded>")
        .to_string()
}

fn main() {
    println!("=== Roomsync Shared Room Example ===\n");

    let bus = Rc::new(RefCell::new(Bus::default()));
    let room = RoomId::new("4821", "runner");

    let mut clients = vec![
        make_client(&bus, &room, "alice", "Alice"),
        make_client(&bus, &room, "bob", "Bob"),
    ];

    // Alice joins an empty room. No snapshot arrives inside the bootstrap
    // grace window, so her first tick past it self-seeds and claims.
    clients[0].connect(0).unwrap();
    pump(&bus, &mut clients[..1], 0);
    clients[0].tick(&idle(), 300, 16).unwrap();
    println!(
        "t=300   Alice seeded and claimed: owner={} epoch={}",
        clients[0].is_owner(),
        clients[0].ownership().map(|c| c.epoch).unwrap_or(0),
    );

    // Bob joins next and receives the existing snapshot, so he stays a
    // replica under Alice's claim.
    clients[1].connect(400).unwrap();
    pump(&bus, &mut clients, 400);
    clients[1].tick(&idle(), 420, 16).unwrap();
    println!(
        "t=420   Bob adopted snapshot: owner={} title={:?}\n",
        clients[1].is_owner(),
        title(&clients[1]),
    );

    // Bob holds right for half a second. His held controls publish once
    // (edge-triggered); Alice consumes the relayed sample every tick and
    // broadcasts on her debounce cadence; Bob predicts locally and keeps
    // his prediction when her snapshots land.
    println!("Bob holds right for 500ms...");
    let mut now = 500;
    while now < 1_000 {
        clients[0].tick(&idle(), now, 16).unwrap();
        clients[1].tick(&hold_right(), now, 16).unwrap();
        pump(&bus, &mut clients, now);
        now += 16;
    }
    println!(
        "t={now}  bob.x: authoritative={:.1} predicted={:.1}\n",
        player_x(&clients[0], "bob"),
        player_x(&clients[1], "bob"),
    );

    // Alice renames the room. Bob is mid-edit on another field, so her
    // broadcast is deferred wholesale until his idle window closes, then
    // applied with his fresh edit restored.
    clients[0]
        .edit("hud.title".parse().unwrap(), Value::from("Final Lap"), now)
        .unwrap();
    clients[1]
        .edit("hud.notes".parse().unwrap(), Value::from("bob was here"), now)
        .unwrap();
    println!("t={now}  Alice renames the room; Bob is editing notes");
    while now < 1_400 {
        clients[0].tick(&idle(), now, 16).unwrap();
        clients[1].tick(&idle(), now, 16).unwrap();
        pump(&bus, &mut clients, now);
        now += 16;
    }
    println!("t={now}  (Bob still editing) Bob sees title={:?}", title(&clients[1]));
    while now < 2_400 {
        clients[0].tick(&idle(), now, 16).unwrap();
        clients[1].tick(&idle(), now, 16).unwrap();
        pump(&bus, &mut clients, now);
        now += 16;
    }
    println!("t={now}  (Bob idle again) Bob sees title={:?}\n", title(&clients[1]));

    // Alice leaves. Bob watches her claim go silent past the owner
    // timeout and promotes himself with a fenced epoch bump.
    println!("Alice leaves the room...");
    clients[0].leave().unwrap();
    while now < 5_000 {
        clients[1].tick(&idle(), now, 16).unwrap();
        now += 16;
    }
    println!(
        "t={now}  Bob promoted: owner={} epoch={}",
        clients[1].is_owner(),
        clients[1].ownership().map(|c| c.epoch).unwrap_or(0),
    );

    println!("\n=== Session Complete ===");
}
