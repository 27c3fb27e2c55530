//! Timetable slot read model.
//!
//! The timetable itself is curated by the dashboard; the engine only ever
//! queries the slot covering "now", joined with display names so session
//! lifecycle logs can name the class.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSlot {
    pub slot_id: i64,
    pub subject_id: i64,
    pub class_id: i64,
    pub teacher_id: i64,
    /// Weekday name, `Monday` through `Sunday`.
    pub day: String,
    /// Inclusive start, `HH:MM`.
    pub start_time: String,
    /// Exclusive end, `HH:MM`.
    pub end_time: String,
    pub subject_name: String,
    pub class_name: String,
    pub teacher_name: String,
}
