//! Review entity.

use chrono::{DateTime, Utc};
use domain::models::Review;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the reviews table.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewEntity {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewEntity> for Review {
    fn from(entity: ReviewEntity) -> Self {
        Review {
            id: entity.id,
            booking_id: entity.booking_id,
            provider_id: entity.provider_id,
            rating: entity.rating,
            comment: entity.comment,
            created_at: entity.created_at,
        }
    }
}
