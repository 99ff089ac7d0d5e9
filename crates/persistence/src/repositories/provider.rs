//! Provider repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{
    NewProviderWarning, NewSecurityFlag, OnboardingStats, Provider, ProviderActivity,
    ProviderStatus, ProviderSummary, ProviderWarning, SecurityFlag, ServiceArea, ZoneCount,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::entities::{
    ProviderActivityEntity, ProviderEntity, ProviderWarningEntity, SecurityFlagEntity,
};
use crate::metrics::QueryTimer;

const PROVIDER_COLUMNS: &str = r#"
    p.id, p.name, p.phone, p.status, p.is_online, p.verified, p.skills, p.zones,
    p.on_time_pct, p.completion_pct, p.current_latitude, p.current_longitude,
    p.last_location_update, p.created_at
"#;

#[derive(FromRow)]
struct SignupRow {
    signups: i64,
    verified: i64,
    activated: i64,
}

#[derive(FromRow)]
struct SummaryRow {
    new_providers: i64,
    active_providers: i64,
    verified_providers: i64,
}

/// Repository for provider database operations.
#[derive(Clone)]
pub struct ProviderRepository {
    pool: PgPool,
}

impl ProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Provider>, sqlx::Error> {
        let sql = format!("SELECT {} FROM providers p WHERE p.id = $1", PROVIDER_COLUMNS);
        let row = sqlx::query_as::<_, ProviderEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// ACTIVE, online providers with the skill and zone, best first.
    pub async fn find_replacement_candidates(
        &self,
        category: &str,
        city: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Provider>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM providers p
            WHERE p.status = 'ACTIVE'
              AND p.is_online
              AND $1 = ANY(p.skills)
              AND $2 = ANY(p.zones)
              AND ($3::UUID IS NULL OR p.id <> $3)
            ORDER BY p.on_time_pct DESC, p.completion_pct DESC
            "#,
            PROVIDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProviderEntity>(&sql)
            .bind(category)
            .bind(city)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Pauses the provider and inserts the warning in one transaction.
    /// Returns `None` and writes nothing for an unknown provider.
    pub async fn pause_with_warning(
        &self,
        warning: NewProviderWarning,
    ) -> Result<Option<ProviderWarning>, sqlx::Error> {
        let timer = QueryTimer::new("pause_provider_with_warning");
        let mut tx = self.pool.begin().await?;

        let paused = sqlx::query("UPDATE providers SET status = $2 WHERE id = $1")
            .bind(warning.provider_id)
            .bind(ProviderStatus::Paused.as_str())
            .execute(&mut *tx)
            .await?;
        if paused.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, ProviderWarningEntity>(
            r#"
            INSERT INTO provider_warnings (id, provider_id, reason, details, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, provider_id, reason, details, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(warning.provider_id)
        .bind(&warning.reason)
        .bind(&warning.details)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some(row.into()))
    }

    /// Pauses the provider and inserts the security flag in one transaction.
    pub async fn pause_with_flag(
        &self,
        provider_id: Uuid,
        flag: NewSecurityFlag,
    ) -> Result<Option<SecurityFlag>, sqlx::Error> {
        let timer = QueryTimer::new("pause_provider_with_flag");
        let mut tx = self.pool.begin().await?;

        let paused = sqlx::query("UPDATE providers SET status = $2 WHERE id = $1")
            .bind(provider_id)
            .bind(ProviderStatus::Paused.as_str())
            .execute(&mut *tx)
            .await?;
        if paused.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

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
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some(row.into()))
    }

    pub async fn count_covering(&self, area: &ServiceArea) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM providers
            WHERE status = 'ACTIVE' AND $1 = ANY(zones) AND $2 = ANY(skills)
            "#,
        )
        .bind(&area.city)
        .bind(&area.category)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn count_available(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM providers WHERE status = 'ACTIVE' AND is_online")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn onboarding_stats(
        &self,
        since: DateTime<Utc>,
        zone_limit: usize,
    ) -> Result<OnboardingStats, sqlx::Error> {
        let timer = QueryTimer::new("provider_onboarding_stats");

        let signups = sqlx::query_as::<_, SignupRow>(
            r#"
            SELECT COUNT(*) AS signups,
                   COUNT(*) FILTER (WHERE p.verified) AS verified,
                   COUNT(*) FILTER (WHERE EXISTS (
                       SELECT 1 FROM bookings b
                       WHERE b.provider_id = p.id AND b.status = 'COMPLETED'
                   )) AS activated
            FROM providers p
            WHERE p.created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let zones: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT zone, COUNT(*) AS providers
            FROM providers, UNNEST(zones) AS zone
            WHERE created_at >= $1
            GROUP BY zone
            ORDER BY providers DESC, zone ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(zone_limit as i64)
        .fetch_all(&self.pool)
        .await?;

        timer.record();

        Ok(OnboardingStats {
            signups: signups.signups,
            verified: signups.verified,
            activated: signups.activated,
            top_zones: zones
                .into_iter()
                .map(|(zone, providers)| ZoneCount { zone, providers })
                .collect(),
        })
    }

    /// ACTIVE, verified providers older than the cutoff with their bookings
    /// created since `since`.
    pub async fn list_activity(
        &self,
        created_before: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> Result<Vec<ProviderActivity>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {},
                   COUNT(b.id) AS total_bookings,
                   COUNT(b.id) FILTER (WHERE b.status = 'COMPLETED') AS completed_bookings
            FROM providers p
            LEFT JOIN bookings b ON b.provider_id = p.id AND b.created_at >= $2
            WHERE p.status = 'ACTIVE' AND p.verified AND p.created_at < $1
            GROUP BY p.id
            ORDER BY p.created_at ASC
            "#,
            PROVIDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProviderActivityEntity>(&sql)
            .bind(created_before)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ProviderSummary, sqlx::Error> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2) AS new_providers,
                   COUNT(*) FILTER (WHERE status = 'ACTIVE') AS active_providers,
                   COUNT(*) FILTER (WHERE verified AND created_at >= $1 AND created_at < $2)
                       AS verified_providers
            FROM providers
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProviderSummary {
            new_providers: row.new_providers,
            active_providers: row.active_providers,
            verified_providers: row.verified_providers,
        })
    }
}
