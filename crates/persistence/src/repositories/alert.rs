//! System alert and automated action log repository.

use chrono::{DateTime, Utc};
use domain::models::{
    ActionSummary, AlertLevel, AlertStatus, AlertSummary, AutomatedActionLog, NewAutomatedAction,
    NewSystemAlert, SystemAlert,
};
use domain::services::DedupClaim;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::CLAIM_CTE;
use crate::entities::{AutomatedActionLogEntity, SystemAlertEntity};

const ALERT_RETURNING: &str =
    "RETURNING id, level, title, message, details, status, dedup_key, created_at";

#[derive(FromRow)]
struct ActionCountsRow {
    total: i64,
    successful: i64,
    failed: i64,
}

/// Repository for the alert and audit tables.
#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_alert(&self, alert: NewSystemAlert) -> Result<SystemAlert, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO system_alerts (id, level, title, message, details, status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'UNREAD', NOW())
            {}
            "#,
            ALERT_RETURNING
        );
        let row = sqlx::query_as::<_, SystemAlertEntity>(&sql)
            .bind(Uuid::new_v4())
            .bind(alert.level.as_str())
            .bind(&alert.title)
            .bind(&alert.message)
            .bind(&alert.details)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    /// Claims the dedup key and inserts the alert in one statement.
    pub async fn insert_alert_once(
        &self,
        alert: NewSystemAlert,
        claim: &DedupClaim,
    ) -> Result<Option<SystemAlert>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH {}
            INSERT INTO system_alerts (id, level, title, message, details, status, dedup_key, created_at)
            SELECT $3, $4, $5, $6, $7, 'UNREAD', claim.key, NOW() FROM claim
            {}
            "#,
            CLAIM_CTE, ALERT_RETURNING
        );
        let row = sqlx::query_as::<_, SystemAlertEntity>(&sql)
            .bind(&claim.key)
            .bind(claim.expires_at)
            .bind(Uuid::new_v4())
            .bind(alert.level.as_str())
            .bind(&alert.title)
            .bind(&alert.message)
            .bind(&alert.details)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    pub async fn insert_action(
        &self,
        action: NewAutomatedAction,
    ) -> Result<AutomatedActionLog, sqlx::Error> {
        let row = sqlx::query_as::<_, AutomatedActionLogEntity>(
            r#"
            INSERT INTO automated_action_logs (id, module, trigger, action_taken, details, success, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, module, trigger, action_taken, details, success, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&action.module)
        .bind(&action.trigger)
        .bind(&action.action_taken)
        .bind(&action.details)
        .bind(action.success)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<SystemAlert>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SystemAlertEntity>(
            r#"
            SELECT id, level, title, message, details, status, dedup_key, created_at
            FROM system_alerts
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn alert_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AlertSummary, sqlx::Error> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT level, status, COUNT(*)
            FROM system_alerts
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY level, status
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = AlertSummary::default();
        for (level, status, count) in rows {
            let level = level.parse::<AlertLevel>().unwrap_or(AlertLevel::Info);
            let status = status.parse::<AlertStatus>().unwrap_or(AlertStatus::Unread);
            summary.add(level, status, count);
        }
        Ok(summary)
    }

    pub async fn action_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ActionSummary, sqlx::Error> {
        let row = sqlx::query_as::<_, ActionCountsRow>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE success) AS successful,
                   COUNT(*) FILTER (WHERE NOT success) AS failed
            FROM automated_action_logs
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(ActionSummary {
            total: row.total,
            successful: row.successful,
            failed: row.failed,
        })
    }
}
