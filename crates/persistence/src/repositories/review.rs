//! Review repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{Review, ReviewSummary, LOW_RATING_THRESHOLD};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ReviewEntity;

/// Repository for review database operations.
#[derive(Clone)]
pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Low-rated reviews for a provider since the cutoff, oldest first.
    pub async fn list_low_for_provider(
        &self,
        provider_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Review>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ReviewEntity>(
            r#"
            SELECT id, booking_id, provider_id, rating, comment, created_at
            FROM reviews
            WHERE provider_id = $1 AND rating < $2 AND created_at >= $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(provider_id)
        .bind(LOW_RATING_THRESHOLD)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ReviewSummary, sqlx::Error> {
        let ratings: Vec<i16> = sqlx::query_scalar(
            "SELECT rating FROM reviews WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(ReviewSummary::from_ratings(ratings))
    }
}
