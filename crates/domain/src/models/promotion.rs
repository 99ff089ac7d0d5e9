//! Promotion domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default coins paid to the referrer when no promotion says otherwise.
pub const DEFAULT_REFERRER_BONUS: i64 = 25;

/// Default coins paid to the referred user when no promotion says otherwise.
pub const DEFAULT_REFERRED_BONUS: i64 = 50;

/// Kind of automated promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionType {
    ReferralBooster,
}

impl PromotionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionType::ReferralBooster => "REFERRAL_BOOSTER",
        }
    }
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PromotionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REFERRAL_BOOSTER" => Ok(PromotionType::ReferralBooster),
            _ => Err(format!("Invalid promotion type: {}", s)),
        }
    }
}

/// A time-boxed promotion scoped to a city.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePromotion {
    pub id: Uuid,
    pub name: String,
    pub promotion_type: PromotionType,
    pub city: String,
    /// Bonus amounts and the reason the promotion was created.
    pub details: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ActivePromotion {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Referral bonus amounts carried by this promotion, with defaults for
    /// missing fields.
    pub fn referral_bonus(&self) -> ReferralBonus {
        ReferralBonus {
            referrer: self.details["referrerBonus"]
                .as_i64()
                .unwrap_or(DEFAULT_REFERRER_BONUS),
            referred: self.details["bonusAmount"]
                .as_i64()
                .unwrap_or(DEFAULT_REFERRED_BONUS),
        }
    }
}

/// Input for creating a promotion.
#[derive(Debug, Clone)]
pub struct NewPromotion {
    pub name: String,
    pub promotion_type: PromotionType,
    pub city: String,
    pub details: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

impl NewPromotion {
    /// Dedup key shared by every promotion of the same type and city.
    pub fn scope_key(&self) -> String {
        format!("promotion:{}:{}", self.promotion_type.as_str(), self.city)
    }
}

/// Coins paid out when a referral is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralBonus {
    pub referrer: i64,
    pub referred: i64,
}

impl Default for ReferralBonus {
    fn default() -> Self {
        Self {
            referrer: DEFAULT_REFERRER_BONUS,
            referred: DEFAULT_REFERRED_BONUS,
        }
    }
}
