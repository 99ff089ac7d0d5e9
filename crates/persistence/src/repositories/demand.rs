//! Unmet demand (service request log) repository.

use chrono::{DateTime, Utc};
use domain::models::ServiceRequestLog;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ServiceRequestLogEntity;

/// Repository for service request logs.
#[derive(Clone)]
pub struct DemandRepository {
    pool: PgPool,
}

impl DemandRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts the (term, city) row, bumping its count.
    pub async fn record(
        &self,
        search_term: &str,
        city: &str,
        at: DateTime<Utc>,
    ) -> Result<ServiceRequestLog, sqlx::Error> {
        let row = sqlx::query_as::<_, ServiceRequestLogEntity>(
            r#"
            INSERT INTO service_request_logs (id, search_term, city, count, last_searched_at, created_at)
            VALUES ($1, $2, $3, 1, $4, $4)
            ON CONFLICT (search_term, city) DO UPDATE
                SET count = service_request_logs.count + 1,
                    last_searched_at = EXCLUDED.last_searched_at
            RETURNING id, search_term, city, count, last_searched_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(search_term)
        .bind(city)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn list_since(
        &self,
        since: DateTime<Utc>,
        min_count: i64,
    ) -> Result<Vec<ServiceRequestLog>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ServiceRequestLogEntity>(
            r#"
            SELECT id, search_term, city, count, last_searched_at, created_at
            FROM service_request_logs
            WHERE last_searched_at >= $1 AND count >= $2
            ORDER BY count DESC, last_searched_at DESC
            "#,
        )
        .bind(since)
        .bind(min_count)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
