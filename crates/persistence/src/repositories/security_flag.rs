//! Security flag repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{FlagType, NewSecurityFlag, SecurityFlag};
use domain::services::DedupClaim;
use sqlx::PgPool;
use uuid::Uuid;

use super::CLAIM_CTE;
use crate::entities::SecurityFlagEntity;

/// Repository for security flag database operations.
#[derive(Clone)]
pub struct SecurityFlagRepository {
    pool: PgPool,
}

impl SecurityFlagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, flag: NewSecurityFlag) -> Result<SecurityFlag, sqlx::Error> {
        let row = sqlx::query_as::<_, SecurityFlagEntity>(
            r#"
            INSERT INTO security_flags (id, user_id, provider_id, flag_type, status, details, created_at)
            VALUES ($1, $2, $3, $4, 'PENDING_REVIEW', $5, NOW())
            RETURNING id, user_id, provider_id, flag_type, status, details, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(flag.subject.user_id())
        .bind(flag.subject.provider_id())
        .bind(flag.flag_type.as_str())
        .bind(&flag.details)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Claims the dedup key and inserts the flag in one statement.
    pub async fn insert_once(
        &self,
        flag: NewSecurityFlag,
        claim: &DedupClaim,
    ) -> Result<Option<SecurityFlag>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH {}
            INSERT INTO security_flags (id, user_id, provider_id, flag_type, status, details, created_at)
            SELECT $3, $4, $5, $6, 'PENDING_REVIEW', $7, NOW() FROM claim
            RETURNING id, user_id, provider_id, flag_type, status, details, created_at
            "#,
            CLAIM_CTE
        );
        let row = sqlx::query_as::<_, SecurityFlagEntity>(&sql)
            .bind(&claim.key)
            .bind(claim.expires_at)
            .bind(Uuid::new_v4())
            .bind(flag.subject.user_id())
            .bind(flag.subject.provider_id())
            .bind(flag.flag_type.as_str())
            .bind(&flag.details)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    pub async fn dismiss_stale(
        &self,
        types: &[FlagType],
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let type_names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        sqlx::query_scalar(
            r#"
            UPDATE security_flags
            SET status = 'DISMISSED'
            WHERE status = 'PENDING_REVIEW'
              AND flag_type = ANY($1)
              AND created_at < $2
            RETURNING id
            "#,
        )
        .bind(type_names)
        .bind(created_before)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_created(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM security_flags WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
    }
}
