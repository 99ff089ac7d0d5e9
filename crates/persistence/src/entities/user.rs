//! User and referral entities.

use chrono::{DateTime, Utc};
use domain::models::{Referral, User};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub coins: i64,
    pub last_seen: Option<DateTime<Utc>>,
    pub shadow_banned: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        User {
            id: entity.id,
            name: entity.name,
            phone: entity.phone,
            coins: entity.coins,
            last_seen: entity.last_seen,
            shadow_banned: entity.shadow_banned,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the referrals table.
#[derive(Debug, Clone, FromRow)]
pub struct ReferralEntity {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Option<Uuid>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ReferralEntity> for Referral {
    fn from(entity: ReferralEntity) -> Self {
        Referral {
            id: entity.id,
            referrer_id: entity.referrer_id,
            referred_id: entity.referred_id,
            redeemed_at: entity.redeemed_at,
            created_at: entity.created_at,
        }
    }
}
