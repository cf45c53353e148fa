//! Per-device presence state and notification debounce
//!
//! Every sighting goes through [`PresenceStore::record_sighting`], which
//! decides whether the sighting starts a new presence episode. The caller
//! confirms the decision with [`PresenceStore::mark_notified`] once it has
//! committed to sending. Absence is never observed directly: a device
//! re-arms when the gap between two sightings exceeds the reset window.
//!
//! ```text
//!   first sighting          mark_notified
//!  ──────────────► Armed ─────────────────► Notified
//!                    ▲                          │
//!                    │  sighting after gap      │ sighting within gap
//!                    └────── > reset ───────────┤ (suppressed)
//!                                               ▼
//!                                           Notified
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// State tracked for one hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    /// Most recent positive sighting
    pub last_seen: DateTime<Utc>,
    /// Whether this presence episode has already been announced
    pub notified: bool,
}

/// A device entry as exposed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceEntry {
    pub mac: String,
    #[serde(flatten)]
    pub state: DeviceState,
}

/// In-memory presence store, keyed by hardware address
#[derive(Debug)]
pub struct PresenceStore {
    absence_reset: TimeDelta,
    devices: HashMap<String, DeviceState>,
}

impl PresenceStore {
    /// Create a store that re-arms after `absence_reset` without sightings
    pub fn new(absence_reset: TimeDelta) -> Self {
        Self {
            absence_reset,
            devices: HashMap::new(),
        }
    }

    /// Create a store with the reset window given in minutes
    pub fn with_reset_minutes(minutes: u64) -> Self {
        let reset = i64::try_from(minutes)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .unwrap_or(TimeDelta::MAX);
        Self::new(reset)
    }

    pub fn absence_reset(&self) -> TimeDelta {
        self.absence_reset
    }

    /// Record that `mac` was seen at `now` and report whether to notify.
    ///
    /// Returns `true` for a never-seen address, or when the previous sighting
    /// is older than the reset window. `last_seen` never moves backwards.
    pub fn record_sighting(&mut self, mac: &str, now: DateTime<Utc>) -> bool {
        let Some(state) = self.devices.get_mut(mac) else {
            self.devices.insert(
                mac.to_string(),
                DeviceState {
                    last_seen: now,
                    notified: false,
                },
            );
            return true;
        };

        if now - state.last_seen > self.absence_reset {
            state.notified = false;
        }

        if now > state.last_seen {
            state.last_seen = now;
        }

        !state.notified
    }

    /// Mark the current presence episode of `mac` as announced.
    ///
    /// No-op for an address that has never been sighted.
    pub fn mark_notified(&mut self, mac: &str) {
        if let Some(state) = self.devices.get_mut(mac) {
            state.notified = true;
        }
    }

    pub fn get(&self, mac: &str) -> Option<DeviceState> {
        self.devices.get(mac).copied()
    }

    /// All tracked devices, sorted by address
    pub fn snapshot(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = self
            .devices
            .iter()
            .map(|(mac, state)| PresenceEntry {
                mac: mac.clone(),
                state: *state,
            })
            .collect();
        entries.sort_by(|a, b| a.mac.cmp(&b.mac));
        entries
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
