//! Marketplace user and referral models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A marketplace customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    /// Wallet balance in coins.
    pub coins: i64,
    pub last_seen: Option<DateTime<Utc>>,
    pub shadow_banned: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Inactive when last seen before the cutoff, or never seen and
    /// created before it.
    pub fn is_inactive_since(&self, cutoff: DateTime<Utc>) -> bool {
        match self.last_seen {
            Some(seen) => seen < cutoff,
            None => self.created_at < cutoff,
        }
    }
}

/// A referral from one user to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Option<Uuid>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }
}

/// Booking count for one user in a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingVolume {
    pub user_id: Uuid,
    pub bookings: i64,
}

/// User aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub new_users: i64,
    /// Users seen during the window.
    pub active_users: i64,
    /// New users that arrived through a referral.
    pub referral_signups: i64,
}
