use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, parse_outcome},
    models::{CaptureSession, SessionOutcome},
    Database,
};

fn row_to_session(row: &Row) -> Result<CaptureSession> {
    let opened_at: String = row.get("opened_at")?;
    let closed_at: Option<String> = row.get("closed_at")?;
    let outcome: Option<String> = row.get("outcome")?;

    Ok(CaptureSession {
        id: row.get("id")?,
        slot_id: row.get("slot_id")?,
        subject_id: row.get("subject_id")?,
        opened_at: parse_datetime(&opened_at, "opened_at")?,
        closed_at: parse_optional_datetime(closed_at, "closed_at")?,
        outcome: outcome.as_deref().map(parse_outcome).transpose()?,
    })
}

impl Database {
    pub async fn insert_capture_session(&self, session: &CaptureSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO capture_sessions (id, slot_id, subject_id, opened_at, closed_at, outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.slot_id,
                    record.subject_id,
                    record.opened_at.to_rfc3339(),
                    record.closed_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.outcome.map(|o| o.as_str()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn close_capture_session(
        &self,
        session_id: &str,
        closed_at: DateTime<Utc>,
        outcome: SessionOutcome,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE capture_sessions
                 SET closed_at = ?1,
                     outcome = ?2
                 WHERE id = ?3",
                params![closed_at.to_rfc3339(), outcome.as_str(), session_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Rows left open by a crash; used for startup recovery.
    pub async fn open_capture_sessions(&self) -> Result<Vec<CaptureSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slot_id, subject_id, opened_at, closed_at, outcome
                 FROM capture_sessions
                 WHERE closed_at IS NULL
                 ORDER BY opened_at DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn get_capture_session(&self, session_id: &str) -> Result<Option<CaptureSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slot_id, subject_id, opened_at, closed_at, outcome
                 FROM capture_sessions
                 WHERE id = ?1",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
        .await
    }
}
