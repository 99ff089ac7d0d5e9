//! Active promotion entity.

use chrono::{DateTime, Utc};
use domain::models::{ActivePromotion, PromotionType};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the active_promotions table.
#[derive(Debug, Clone, FromRow)]
pub struct ActivePromotionEntity {
    pub id: Uuid,
    pub name: String,
    pub promotion_type: String,
    pub city: String,
    pub details: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<ActivePromotionEntity> for ActivePromotion {
    fn from(entity: ActivePromotionEntity) -> Self {
        ActivePromotion {
            id: entity.id,
            name: entity.name,
            promotion_type: entity
                .promotion_type
                .parse::<PromotionType>()
                .unwrap_or(PromotionType::ReferralBooster),
            city: entity.city,
            details: entity.details,
            expires_at: entity.expires_at,
            created_at: entity.created_at,
        }
    }
}
