//! Weekly report model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored weekly report. At most one exists per `week_ending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub id: Uuid,
    pub week_ending: NaiveDate,
    pub summary: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Input for storing a weekly report.
#[derive(Debug, Clone)]
pub struct NewWeeklyReport {
    pub week_ending: NaiveDate,
    pub summary: serde_json::Value,
}
