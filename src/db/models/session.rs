use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    /// The worker had to be forced down, or ended early on a persistent
    /// capture failure; records up to that point were still finalized.
    Aborted,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "Completed",
            SessionOutcome::Aborted => "Aborted",
        }
    }
}

/// Durable log row for one capture run of a timetable slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub id: String,
    pub slot_id: i64,
    pub subject_id: i64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub outcome: Option<SessionOutcome>,
}
