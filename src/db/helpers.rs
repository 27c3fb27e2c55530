use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::db::models::{AttendanceStatus, SessionOutcome};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_status(value: &str) -> Result<AttendanceStatus> {
    match value {
        "Present" => Ok(AttendanceStatus::Present),
        "Absent" => Ok(AttendanceStatus::Absent),
        other => Err(anyhow!("unknown attendance status {other}")),
    }
}

pub fn parse_outcome(value: &str) -> Result<SessionOutcome> {
    match value {
        "Completed" => Ok(SessionOutcome::Completed),
        "Aborted" => Ok(SessionOutcome::Aborted),
        other => Err(anyhow!("unknown session outcome {other}")),
    }
}
