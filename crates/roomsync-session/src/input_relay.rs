//! Input relay - edge-triggered control-state broadcast
//!
//! Control state is a level signal, not an event stream: what matters is
//! the latest value, not every transition in between. That shapes both
//! directions of the relay:
//!
//! - **Outgoing**: a sample is published only when the controls differ
//!   from the last published set, bounding message rate independently of
//!   tick rate. Holding a key for a hundred ticks produces one publish.
//! - **Incoming**: the owner keeps the latest sample per peer,
//!   overwritten on arrival, never queued. Reordered or dropped samples
//!   cost at most one stale frame.
//!
//! Samples from peers missing from the latest presence roster are dropped
//! so a disconnected peer's last keypress cannot keep steering its entity.

use indexmap::IndexMap;
use roomsync_core::{Millis, PeerId};
use serde::{Deserialize, Serialize};

/// One named control channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlValue {
    /// A pressed/released control (key, button)
    Button(bool),
    /// A continuous control (stick axis, slider)
    Axis(f64),
}

impl From<bool> for ControlValue {
    fn from(pressed: bool) -> Self {
        ControlValue::Button(pressed)
    }
}

impl From<f64> for ControlValue {
    fn from(value: f64) -> Self {
        ControlValue::Axis(value)
    }
}

/// Named control channels for one peer
pub type Controls = IndexMap<String, ControlValue>;

/// Latest known sample per peer, what the owner simulates from each tick
pub type InputFrame = IndexMap<PeerId, InputSample>;

/// A point-in-time reading of one peer's controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSample {
    /// The control levels at capture time
    pub controls: Controls,
    /// When the sample was captured (sender's clock)
    pub sent_at: Millis,
}

/// Edge-triggered outgoing capture plus last-value-wins incoming store
#[derive(Debug, Default)]
pub struct InputRelay {
    /// Controls as last published, for edge detection
    last_sent: Option<Controls>,
    /// Latest sample per remote peer
    latest: InputFrame,
}

impl InputRelay {
    /// Create an empty relay
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the local controls for publishing, if they changed
    ///
    /// Returns a sample only on an edge: the first capture, and any
    /// capture whose controls differ from the previously published set.
    pub fn capture(&mut self, controls: &Controls, now: Millis) -> Option<InputSample> {
        if self.last_sent.as_ref() == Some(controls) {
            return None;
        }
        self.last_sent = Some(controls.clone());
        Some(InputSample {
            controls: controls.clone(),
            sent_at: now,
        })
    }

    /// Store an incoming sample, overwriting any previous one for the peer
    pub fn store(&mut self, origin: PeerId, sample: InputSample) {
        self.latest.insert(origin, sample);
    }

    /// Latest known sample for one peer
    pub fn latest(&self, peer: &PeerId) -> Option<&InputSample> {
        self.latest.get(peer)
    }

    /// The frame the owner consumes each simulation tick
    pub fn frame(&self) -> &InputFrame {
        &self.latest
    }

    /// Drop samples for peers absent from the current presence roster
    pub fn retain_present(&mut self, present: &[PeerId]) {
        let before = self.latest.len();
        self.latest.retain(|peer, _| present.contains(peer));
        let dropped = before - self.latest.len();
        if dropped > 0 {
            log::debug!("dropped {} input sample(s) from departed peers", dropped);
        }
    }

    /// Number of peers with a stored sample
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    /// Whether no samples are stored
    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// Forget everything (room leave)
    pub fn clear(&mut self) {
        self.last_sent = None;
        self.latest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls(left: bool, right: bool) -> Controls {
        let mut c = Controls::new();
        c.insert("left".to_string(), ControlValue::Button(left));
        c.insert("right".to_string(), ControlValue::Button(right));
        c
    }

    #[test]
    fn test_capture_is_edge_triggered() {
        let mut relay = InputRelay::new();
        let held = controls(true, false);

        // First capture is the edge; the next 99 held ticks publish nothing.
        assert!(relay.capture(&held, 0).is_some());
        let extra: usize = (1..100)
            .filter(|tick| relay.capture(&held, *tick * 16).is_some())
            .count();
        assert_eq!(extra, 0);

        // Releasing is a new edge.
        assert!(relay.capture(&controls(false, false), 1_600).is_some());
    }

    #[test]
    fn test_store_overwrites_never_queues() {
        let mut relay = InputRelay::new();
        let peer = PeerId::new("p2");
        relay.store(
            peer.clone(),
            InputSample {
                controls: controls(true, false),
                sent_at: 10,
            },
        );
        relay.store(
            peer.clone(),
            InputSample {
                controls: controls(false, true),
                sent_at: 20,
            },
        );

        assert_eq!(relay.len(), 1);
        let latest = relay.latest(&peer).unwrap();
        assert_eq!(latest.sent_at, 20);
        assert_eq!(
            latest.controls.get("right"),
            Some(&ControlValue::Button(true))
        );
    }

    #[test]
    fn test_retain_present_drops_ghosts() {
        let mut relay = InputRelay::new();
        let here = PeerId::new("here");
        let gone = PeerId::new("gone");
        relay.store(
            here.clone(),
            InputSample {
                controls: controls(true, false),
                sent_at: 0,
            },
        );
        relay.store(
            gone.clone(),
            InputSample {
                controls: controls(false, true),
                sent_at: 0,
            },
        );

        relay.retain_present(&[here.clone()]);
        assert!(relay.latest(&here).is_some());
        assert!(relay.latest(&gone).is_none());
    }

    #[test]
    fn test_axis_controls_compare() {
        let mut relay = InputRelay::new();
        let mut c = Controls::new();
        c.insert("throttle".to_string(), ControlValue::Axis(0.5));
        assert!(relay.capture(&c, 0).is_some());
        assert!(relay.capture(&c, 16).is_none());

        c.insert("throttle".to_string(), ControlValue::Axis(0.6));
        assert!(relay.capture(&c, 32).is_some());
    }
}
