//! Weekly report repository.

use chrono::NaiveDate;
use domain::models::{NewWeeklyReport, WeeklyReport};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::WeeklyReportEntity;

/// Repository for weekly reports.
#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_week(
        &self,
        week_ending: NaiveDate,
    ) -> Result<Option<WeeklyReport>, sqlx::Error> {
        let row = sqlx::query_as::<_, WeeklyReportEntity>(
            "SELECT id, week_ending, summary, created_at FROM weekly_reports WHERE week_ending = $1",
        )
        .bind(week_ending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Inserts unless a report for the week exists.
    pub async fn insert_if_absent(
        &self,
        report: NewWeeklyReport,
    ) -> Result<Option<WeeklyReport>, sqlx::Error> {
        let row = sqlx::query_as::<_, WeeklyReportEntity>(
            r#"
            INSERT INTO weekly_reports (id, week_ending, summary, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (week_ending) DO NOTHING
            RETURNING id, week_ending, summary, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(report.week_ending)
        .bind(&report.summary)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
