use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::{
    db::{
        models::{AttendanceRecord, AttendanceStatus},
        Database,
    },
    sampling::PresenceRecord,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionSummary {
    pub present: usize,
    pub absent: usize,
}

/// The join point of the two confirmation streams.
///
/// Badge taps prove a student entered; visual duration proves they stayed.
/// Present requires both. Students with no activity at all in either stream
/// are left alone — backfilling explicit Absent rows for a full roster is a
/// policy call that lives above this engine.
#[derive(Clone)]
pub struct FusionEngine {
    db: Database,
    min_duration_minutes: f64,
}

impl FusionEngine {
    pub fn new(db: Database, min_duration_minutes: u64) -> Self {
        Self {
            db,
            min_duration_minutes: min_duration_minutes as f64,
        }
    }

    /// Merge the badge log with the session's presence records and persist
    /// final statuses for the subject and date.
    ///
    /// Runs as one atomic batch: either every record for the session lands
    /// or none does, and re-running with the same inputs rewrites the same
    /// rows in place.
    pub async fn finalize(
        &self,
        subject_id: i64,
        date: NaiveDate,
        records: &[PresenceRecord],
    ) -> Result<FusionSummary> {
        let badge_set = self
            .db
            .badge_confirmed_identities(subject_id, date)
            .await
            .context("failed to read badge event log")?;

        let mut durations: BTreeMap<i64, f64> = BTreeMap::new();
        for record in records {
            durations.insert(record.identity_id, record.duration_minutes());
        }

        // Everyone with any activity that day: seen on camera, badged, or both.
        let mut identities: BTreeSet<i64> = durations.keys().copied().collect();
        identities.extend(badge_set.iter().copied());

        let mut batch = Vec::with_capacity(identities.len());
        let mut summary = FusionSummary::default();

        for identity_id in identities {
            let badge_confirmed = badge_set.contains(&identity_id);
            let duration = durations.get(&identity_id).copied().unwrap_or(0.0);
            let face_ok = duration >= self.min_duration_minutes;

            let status = if badge_confirmed && face_ok {
                summary.present += 1;
                AttendanceStatus::Present
            } else {
                summary.absent += 1;
                AttendanceStatus::Absent
            };

            batch.push(AttendanceRecord {
                student_id: identity_id,
                subject_id,
                date,
                status,
            });
        }

        self.db
            .upsert_attendance_batch(batch)
            .await
            .context("failed to persist attendance batch")?;

        info!(
            "attendance finalized for subject {subject_id} on {date}: {} present, {} absent",
            summary.present, summary.absent
        );

        Ok(summary)
    }
}
