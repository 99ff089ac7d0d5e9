//! User and referral repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{Referral, ReferralBonus, User, UserSummary};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::entities::{ReferralEntity, UserEntity};
use crate::metrics::QueryTimer;

#[derive(FromRow)]
struct SummaryRow {
    new_users: i64,
    active_users: i64,
    referral_signups: i64,
}

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, name, phone, coins, last_seen, shadow_banned, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Other users whose phone matches after stripping formatting characters.
    /// `phone` must already be normalized.
    pub async fn find_by_phone(&self, phone: &str, exclude: Uuid) -> Result<Vec<User>, sqlx::Error> {
        let rows = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, name, phone, coins, last_seen, shadow_banned, created_at
            FROM users
            WHERE regexp_replace(phone, '[\s\-().]', '', 'g') = $1
              AND id <> $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(phone)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Adds coins and returns the new balance, or `None` for an unknown user.
    pub async fn credit_coins(&self, id: Uuid, amount: i64) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("UPDATE users SET coins = coins + $2 WHERE id = $1 RETURNING coins")
            .bind(id)
            .bind(amount)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_inactive(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>, sqlx::Error> {
        let rows = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT u.id, u.name, u.phone, u.coins, u.last_seen, u.shadow_banned, u.created_at
            FROM users u
            WHERE NOT u.shadow_banned
              AND COALESCE(u.last_seen, u.created_at) < $1
              AND EXISTS (SELECT 1 FROM bookings b WHERE b.user_id = u.id)
            ORDER BY u.created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<UserSummary, sqlx::Error> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users
                 WHERE created_at >= $1 AND created_at < $2) AS new_users,
                (SELECT COUNT(*) FROM users
                 WHERE last_seen >= $1 AND last_seen < $2) AS active_users,
                (SELECT COUNT(*) FROM referrals r
                 JOIN users u ON u.id = r.referred_id
                 WHERE u.created_at >= $1 AND u.created_at < $2) AS referral_signups
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserSummary {
            new_users: row.new_users,
            active_users: row.active_users,
            referral_signups: row.referral_signups,
        })
    }

    pub async fn find_referral(&self, id: Uuid) -> Result<Option<Referral>, sqlx::Error> {
        let row = sqlx::query_as::<_, ReferralEntity>(
            "SELECT id, referrer_id, referred_id, redeemed_at, created_at FROM referrals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn find_unredeemed_referral(
        &self,
        referred_id: Uuid,
    ) -> Result<Option<Referral>, sqlx::Error> {
        let row = sqlx::query_as::<_, ReferralEntity>(
            r#"
            SELECT id, referrer_id, referred_id, redeemed_at, created_at
            FROM referrals
            WHERE referred_id = $1 AND redeemed_at IS NULL
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(referred_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Redeems the referral and credits both wallets in one transaction.
    /// Returns `None` when the referral was already redeemed. A missing
    /// wallet rolls everything back with `RowNotFound`.
    pub async fn settle_referral(
        &self,
        id: Uuid,
        bonus: ReferralBonus,
        at: DateTime<Utc>,
    ) -> Result<Option<Referral>, sqlx::Error> {
        let timer = QueryTimer::new("settle_referral");
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, ReferralEntity>(
            r#"
            UPDATE referrals
            SET redeemed_at = $2
            WHERE id = $1 AND redeemed_at IS NULL AND referred_id IS NOT NULL
            RETURNING id, referrer_id, referred_id, redeemed_at, created_at
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        for (user_id, amount) in [
            (Some(row.referrer_id), bonus.referrer),
            (row.referred_id, bonus.referred),
        ] {
            sqlx::query("UPDATE users SET coins = coins + $2 WHERE id = $1 RETURNING id")
                .bind(user_id)
                .bind(amount)
                .fetch_one(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(Some(row.into()))
    }
}
