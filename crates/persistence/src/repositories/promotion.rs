//! Active promotion repository.

use chrono::{DateTime, Utc};
use domain::models::{ActivePromotion, NewPromotion, PromotionType};
use sqlx::PgPool;
use uuid::Uuid;

use super::CLAIM_CTE;
use crate::entities::ActivePromotionEntity;

/// Repository for promotion database operations.
#[derive(Clone)]
pub struct PromotionRepository {
    pool: PgPool,
}

impl PromotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the promotion while holding the type+city dedup key until the
    /// promotion expires. `None` when an unexpired promotion already holds it.
    pub async fn insert_once(
        &self,
        promotion: NewPromotion,
    ) -> Result<Option<ActivePromotion>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH {}
            INSERT INTO active_promotions (id, name, promotion_type, city, details, expires_at, created_at)
            SELECT $3, $4, $5, $6, $7, $2, NOW() FROM claim
            RETURNING id, name, promotion_type, city, details, expires_at, created_at
            "#,
            CLAIM_CTE
        );
        let row = sqlx::query_as::<_, ActivePromotionEntity>(&sql)
            .bind(promotion.scope_key())
            .bind(promotion.expires_at)
            .bind(Uuid::new_v4())
            .bind(&promotion.name)
            .bind(promotion.promotion_type.as_str())
            .bind(&promotion.city)
            .bind(&promotion.details)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    pub async fn find_active(
        &self,
        promotion_type: PromotionType,
        at: DateTime<Utc>,
    ) -> Result<Option<ActivePromotion>, sqlx::Error> {
        let row = sqlx::query_as::<_, ActivePromotionEntity>(
            r#"
            SELECT id, name, promotion_type, city, details, expires_at, created_at
            FROM active_promotions
            WHERE promotion_type = $1 AND expires_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(promotion_type.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
