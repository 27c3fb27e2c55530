use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::params;

use crate::db::{
    helpers::{parse_date, parse_status},
    models::AttendanceRecord,
    Database,
};

impl Database {
    /// Write a finalize batch in one transaction.
    ///
    /// Keyed on (student, subject, date): re-finalizing the same session
    /// overwrites statuses in place instead of duplicating rows. Any failure
    /// rolls the whole batch back — attendance is never partially committed.
    pub async fn upsert_attendance_batch(&self, records: Vec<AttendanceRecord>) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open attendance transaction")?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO attendance (student_id, subject_id, date, status)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(student_id, subject_id, date)
                     DO UPDATE SET status = excluded.status",
                )?;

                for record in &records {
                    stmt.execute(params![
                        record.student_id,
                        record.subject_id,
                        record.date.format("%Y-%m-%d").to_string(),
                        record.status.as_str(),
                    ])?;
                }
            }

            tx.commit().context("failed to commit attendance batch")?;
            Ok(())
        })
        .await
    }

    pub async fn attendance_for(
        &self,
        subject_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let date = date.format("%Y-%m-%d").to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT student_id, subject_id, date, status FROM attendance
                 WHERE subject_id = ?1 AND date = ?2
                 ORDER BY student_id ASC",
            )?;

            let mut rows = stmt.query(params![subject_id, date])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(AttendanceRecord {
                    student_id: row.get(0)?,
                    subject_id: row.get(1)?,
                    date: parse_date(&row.get::<_, String>(2)?, "date")?,
                    status: parse_status(&row.get::<_, String>(3)?)?,
                });
            }

            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AttendanceStatus;
    use chrono::NaiveDate;

    async fn db_with_subject() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("rollcall.sqlite3")).unwrap();
        db.execute(|conn| {
            conn.execute("INSERT INTO subjects (id, subject_name) VALUES (1, 'Math')", [])?;
            Ok(())
        })
        .await
        .unwrap();
        (dir, db)
    }

    fn record(student_id: i64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id,
            subject_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
            status,
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_instead_of_duplicating() {
        let (_dir, db) = db_with_subject().await;
        let date = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();

        db.upsert_attendance_batch(vec![record(7, AttendanceStatus::Absent)])
            .await
            .unwrap();
        db.upsert_attendance_batch(vec![record(7, AttendanceStatus::Present)])
            .await
            .unwrap();

        let rows = db.attendance_for(1, date).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn batch_handles_multiple_students() {
        let (_dir, db) = db_with_subject().await;
        let date = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();

        db.upsert_attendance_batch(vec![
            record(7, AttendanceStatus::Present),
            record(8, AttendanceStatus::Absent),
        ])
        .await
        .unwrap();

        let rows = db.attendance_for(1, date).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student_id, 7);
        assert_eq!(rows[1].student_id, 8);
    }
}
