//! Session configuration - timing windows and thresholds
//!
//! All durations are milliseconds of host-supplied time ([`Millis`]).
//! Out-of-range values are clamped, never rejected: a session with an odd
//! config still runs, it just behaves conservatively.

use roomsync_core::Millis;
use serde::{Deserialize, Serialize};

/// Clamp range for the edit idle delay (per editing surface)
const EDIT_IDLE_RANGE: (Millis, Millis) = (100, 5_000);

/// Configuration for one session client
///
/// # Example
///
/// ```
/// use roomsync_session::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_owner_timeout(3_000)
///     .with_snap_threshold(120.0);
/// assert_eq!(config.owner_timeout, 3_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long to wait for an existing snapshot after `request_state`
    /// before self-seeding and claiming ownership
    pub bootstrap_grace: Millis,

    /// Authority silence beyond this triggers self-promotion
    pub owner_timeout: Millis,

    /// Trailing-edge debounce for outgoing state broadcasts; bursts of
    /// local mutation coalesce into one publish
    pub broadcast_debounce: Millis,

    /// Idle delay after the last local edit before queued remote
    /// snapshots are released (clamped to 100..=5000)
    pub edit_idle: Millis,

    /// How long a locally edited field stays protected from remote
    /// overwrite during reconciliation
    pub edit_freshness: Millis,

    /// Positional divergence above which a predicted entity snaps to the
    /// authoritative value instead of keeping its local prediction
    pub snap_threshold: f64,
}

impl SessionConfig {
    /// Set the bootstrap grace window
    pub fn with_bootstrap_grace(mut self, ms: Millis) -> Self {
        self.bootstrap_grace = ms;
        self
    }

    /// Set the owner failover timeout
    pub fn with_owner_timeout(mut self, ms: Millis) -> Self {
        self.owner_timeout = ms;
        self
    }

    /// Set the outgoing broadcast debounce
    pub fn with_broadcast_debounce(mut self, ms: Millis) -> Self {
        self.broadcast_debounce = ms;
        self
    }

    /// Set the edit idle delay (clamped to 100..=5000)
    pub fn with_edit_idle(mut self, ms: Millis) -> Self {
        self.edit_idle = ms.clamp(EDIT_IDLE_RANGE.0, EDIT_IDLE_RANGE.1);
        self
    }

    /// Set the per-field edit freshness window
    pub fn with_edit_freshness(mut self, ms: Millis) -> Self {
        self.edit_freshness = ms;
        self
    }

    /// Set the prediction snap threshold
    pub fn with_snap_threshold(mut self, threshold: f64) -> Self {
        self.snap_threshold = threshold.max(0.0);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bootstrap_grace: 250,
            owner_timeout: 2_000,
            broadcast_debounce: 120,
            edit_idle: 500,
            edit_freshness: 1_500,
            snap_threshold: 80.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.bootstrap_grace, 250);
        assert_eq!(config.owner_timeout, 2_000);
        assert_eq!(config.broadcast_debounce, 120);
        assert_eq!(config.edit_idle, 500);
        assert_eq!(config.edit_freshness, 1_500);
        assert_eq!(config.snap_threshold, 80.0);
    }

    #[test]
    fn test_edit_idle_clamped() {
        let config = SessionConfig::default().with_edit_idle(10);
        assert_eq!(config.edit_idle, 100);

        let config = SessionConfig::default().with_edit_idle(60_000);
        assert_eq!(config.edit_idle, 5_000);
    }

    #[test]
    fn test_snap_threshold_non_negative() {
        let config = SessionConfig::default().with_snap_threshold(-5.0);
        assert_eq!(config.snap_threshold, 0.0);
    }
}
