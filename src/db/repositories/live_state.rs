use anyhow::Result;
use rusqlite::params;

use crate::db::{
    helpers::{parse_datetime, parse_status},
    models::LiveSnapshot,
    Database,
};

impl Database {
    /// Per-tick dashboard upsert. First sighting inserts the row with its
    /// entry time; later ticks only move the exit time, duration, and status.
    pub async fn upsert_live_snapshot(&self, snapshot: &LiveSnapshot) -> Result<()> {
        let record = snapshot.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO live_attendance (identity_id, name, entry, exit, duration_minutes, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(identity_id)
                 DO UPDATE SET exit = excluded.exit,
                               duration_minutes = excluded.duration_minutes,
                               status = excluded.status",
                params![
                    record.identity_id,
                    record.name,
                    record.entry.to_rfc3339(),
                    record.exit.to_rfc3339(),
                    record.duration_minutes,
                    record.status.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Wipe the dashboard view before a new session starts.
    pub async fn clear_live_state(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM live_attendance", [])?;
            Ok(())
        })
        .await
    }

    pub async fn live_snapshots(&self) -> Result<Vec<LiveSnapshot>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT identity_id, name, entry, exit, duration_minutes, status
                 FROM live_attendance
                 ORDER BY identity_id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut snapshots = Vec::new();
            while let Some(row) = rows.next()? {
                snapshots.push(LiveSnapshot {
                    identity_id: row.get(0)?,
                    name: row.get(1)?,
                    entry: parse_datetime(&row.get::<_, String>(2)?, "entry")?,
                    exit: parse_datetime(&row.get::<_, String>(3)?, "exit")?,
                    duration_minutes: row.get(4)?,
                    status: parse_status(&row.get::<_, String>(5)?)?,
                });
            }

            Ok(snapshots)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AttendanceStatus;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn later_ticks_keep_the_first_entry_time() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("rollcall.sqlite3")).unwrap();

        let entry = Utc::now();
        let first = LiveSnapshot {
            identity_id: 7,
            name: "Sana".into(),
            entry,
            exit: entry,
            duration_minutes: 0.0,
            status: AttendanceStatus::Absent,
        };
        db.upsert_live_snapshot(&first).await.unwrap();

        let later = LiveSnapshot {
            entry: entry + Duration::minutes(5),
            exit: entry + Duration::minutes(5),
            duration_minutes: 5.0,
            status: AttendanceStatus::Present,
            ..first
        };
        db.upsert_live_snapshot(&later).await.unwrap();

        let rows = db.live_snapshots().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entry.timestamp(), entry.timestamp());
        assert_eq!(rows[0].duration_minutes, 5.0);
        assert_eq!(rows[0].status, AttendanceStatus::Present);

        db.clear_live_state().await.unwrap();
        assert!(db.live_snapshots().await.unwrap().is_empty());
    }
}
