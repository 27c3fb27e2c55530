use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One badge tap, appended by the external reader service.
///
/// The engine never mutates these; it only reads the set of identities with
/// at least one tap for a given subject and date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeEvent {
    pub id: Option<i64>,
    pub identity_id: i64,
    pub subject_id: i64,
    pub timestamp: DateTime<Utc>,
}
