use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Accumulated visual-presence statistics for one identity in one session.
///
/// `total_ticks` is the session-wide denominator (counted ticks, not
/// per-identity sightings), copied into every record so each one can compute
/// its ratio standalone.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub identity_id: i64,
    pub total_ticks: u64,
    pub matched_ticks: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceRecord {
    /// Fraction of counted ticks this identity was matched in; 0 when no
    /// tick was ever counted.
    pub fn ratio(&self) -> f64 {
        if self.total_ticks == 0 {
            return 0.0;
        }
        self.matched_ticks as f64 / self.total_ticks as f64
    }

    /// Wall-clock minutes between first and last sighting; 0 if never seen.
    pub fn duration_minutes(&self) -> f64 {
        match (self.first_seen, self.last_seen) {
            (Some(first), Some(last)) => ((last - first).num_seconds() as f64 / 60.0).max(0.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct IdentityPresence {
    matched_ticks: u64,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
}

/// Per-session counter state, owned exclusively by the sampling worker.
///
/// Only counted ticks reach this type: a tick dropped on a capture failure
/// touches neither the denominator nor any identity's counters.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    total_ticks: u64,
    entries: HashMap<i64, IdentityPresence>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one counted tick. Every identity in `seen` (already
    /// deduplicated within the tick) gets a matched tick and its sighting
    /// window extended; the denominator advances exactly once either way.
    pub fn record_tick(&mut self, seen: &HashSet<i64>, at: DateTime<Utc>) {
        self.total_ticks += 1;
        for &identity_id in seen {
            let entry = self.entries.entry(identity_id).or_default();
            entry.matched_ticks += 1;
            if entry.first_seen.is_none() {
                entry.first_seen = Some(at);
            }
            entry.last_seen = Some(at);
        }
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn record_for(&self, identity_id: i64) -> Option<PresenceRecord> {
        self.entries.get(&identity_id).map(|entry| PresenceRecord {
            identity_id,
            total_ticks: self.total_ticks,
            matched_ticks: entry.matched_ticks,
            first_seen: entry.first_seen,
            last_seen: entry.last_seen,
        })
    }

    /// Snapshot of every identity observed so far, ordered by id.
    pub fn records(&self) -> Vec<PresenceRecord> {
        let mut records: Vec<PresenceRecord> = self
            .entries
            .keys()
            .filter_map(|&id| self.record_for(id))
            .collect();
        records.sort_by_key(|record| record.identity_id);
        records
    }
}
