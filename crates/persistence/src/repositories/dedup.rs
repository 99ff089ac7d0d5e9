//! Dedup key repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::CLAIM_CTE;

/// Repository for standalone dedup key claims.
#[derive(Clone)]
pub struct DedupRepository {
    pool: PgPool,
}

impl DedupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claim a key until `expires_at`. Returns true when claimed.
    pub async fn claim(&self, key: &str, expires_at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let sql = format!("WITH {} SELECT key FROM claim", CLAIM_CTE);
        let claimed: Option<String> = sqlx::query_scalar(&sql)
            .bind(key)
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(claimed.is_some())
    }

    /// Remove claims that expired before the cutoff.
    pub async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM dedup_keys WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
