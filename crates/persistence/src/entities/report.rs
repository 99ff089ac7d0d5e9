//! Weekly report entity.

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::WeeklyReport;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the weekly_reports table.
#[derive(Debug, Clone, FromRow)]
pub struct WeeklyReportEntity {
    pub id: Uuid,
    pub week_ending: NaiveDate,
    pub summary: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<WeeklyReportEntity> for WeeklyReport {
    fn from(entity: WeeklyReportEntity) -> Self {
        WeeklyReport {
            id: entity.id,
            week_ending: entity.week_ending,
            summary: entity.summary,
            created_at: entity.created_at,
        }
    }
}
