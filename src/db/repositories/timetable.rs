use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{models::TimetableSlot, Database};

fn row_to_slot(row: &Row) -> Result<TimetableSlot> {
    Ok(TimetableSlot {
        slot_id: row.get("id")?,
        subject_id: row.get("subject_id")?,
        class_id: row.get("class_id")?,
        teacher_id: row.get("teacher_id")?,
        day: row.get("day")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        subject_name: row.get("subject_name")?,
        class_name: row.get("class_name")?,
        teacher_name: row.get("teacher_name")?,
    })
}

impl Database {
    /// Slots covering the given weekday and `HH:MM` instant.
    ///
    /// `start_time <= time < end_time`, lowest slot id first. A curated
    /// timetable yields at most one row; callers tie-break on overlap.
    pub async fn find_slots_at(&self, day: &str, time: &str) -> Result<Vec<TimetableSlot>> {
        let day = day.to_string();
        let time = time.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timetable.id, timetable.subject_id, timetable.class_id,
                        timetable.teacher_id, timetable.day, timetable.start_time,
                        timetable.end_time, subjects.subject_name, classes.class_name,
                        teachers.name AS teacher_name
                 FROM timetable
                 JOIN subjects ON timetable.subject_id = subjects.id
                 JOIN classes ON timetable.class_id = classes.id
                 JOIN teachers ON timetable.teacher_id = teachers.id
                 WHERE timetable.day = ?1
                   AND timetable.start_time <= ?2
                   AND timetable.end_time > ?2
                 ORDER BY timetable.id ASC",
            )?;

            let mut rows = stmt.query(params![day, time])?;
            let mut slots = Vec::new();
            while let Some(row) = rows.next()? {
                slots.push(row_to_slot(row)?);
            }

            Ok(slots)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    async fn seeded_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("rollcall.sqlite3")).unwrap();
        db.execute(|conn| {
            conn.execute_batch(
                "INSERT INTO subjects (id, subject_name) VALUES (1, 'Math'), (2, 'Physics');
                 INSERT INTO classes (id, class_name, room_no) VALUES (1, 'CS-A', '101');
                 INSERT INTO teachers (id, name) VALUES (1, 'R. Iyer');
                 INSERT INTO timetable (id, class_id, subject_id, teacher_id, day, start_time, end_time)
                 VALUES (1, 1, 1, 1, 'Monday', '09:00', '10:00'),
                        (2, 1, 2, 1, 'Monday', '10:00', '11:00');",
            )?;
            Ok(())
        })
        .await
        .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn finds_the_covering_slot() {
        let (_dir, db) = seeded_db().await;

        let slots = db.find_slots_at("Monday", "09:30").await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot_id, 1);
        assert_eq!(slots[0].subject_name, "Math");
        assert_eq!(slots[0].teacher_name, "R. Iyer");
    }

    #[tokio::test]
    async fn slot_end_is_exclusive_and_start_inclusive() {
        let (_dir, db) = seeded_db().await;

        let at_start = db.find_slots_at("Monday", "09:00").await.unwrap();
        assert_eq!(at_start[0].slot_id, 1);

        // 10:00 belongs to the next slot, not the one ending then.
        let at_boundary = db.find_slots_at("Monday", "10:00").await.unwrap();
        assert_eq!(at_boundary.len(), 1);
        assert_eq!(at_boundary[0].slot_id, 2);
    }

    #[tokio::test]
    async fn no_slot_outside_scheduled_hours() {
        let (_dir, db) = seeded_db().await;
        assert!(db.find_slots_at("Monday", "12:00").await.unwrap().is_empty());
        assert!(db.find_slots_at("Tuesday", "09:30").await.unwrap().is_empty());
    }
}
