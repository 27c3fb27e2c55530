use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AttendanceStatus;

/// Per-identity snapshot published on every sampling tick for external
/// dashboards. Eventually consistent; a stalled session simply leaves the
/// rows stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub identity_id: i64,
    pub name: String,
    pub entry: DateTime<Utc>,
    pub exit: DateTime<Utc>,
    pub duration_minutes: f64,
    pub status: AttendanceStatus,
}
