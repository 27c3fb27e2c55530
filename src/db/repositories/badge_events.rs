use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::params;

use crate::db::{models::BadgeEvent, Database};

impl Database {
    /// Identities with at least one badge tap for the subject on the given
    /// local date. Timestamps are stored in UTC, so the comparison shifts
    /// them to local wall-clock time first.
    pub async fn badge_confirmed_identities(
        &self,
        subject_id: i64,
        date: NaiveDate,
    ) -> Result<HashSet<i64>> {
        let date = date.format("%Y-%m-%d").to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT identity_id FROM badge_events
                 WHERE subject_id = ?1 AND DATE(timestamp, 'localtime') = ?2",
            )?;

            let mut rows = stmt.query(params![subject_id, date])?;
            let mut identities = HashSet::new();
            while let Some(row) = rows.next()? {
                identities.insert(row.get::<_, i64>(0)?);
            }

            Ok(identities)
        })
        .await
    }

    /// Producer-side append. The engine itself never calls this outside of
    /// tests; the badge reader service owns the write path.
    pub async fn append_badge_event(&self, event: &BadgeEvent) -> Result<()> {
        let record = event.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO badge_events (identity_id, subject_id, timestamp)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.identity_id,
                    record.subject_id,
                    record.timestamp.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }
}
