//! Booking repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{
    AssignmentChange, Booking, BookingContext, BookingSummary, BookingVolume, ResponseStats,
    ServiceArea,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::entities::{BookingContextEntity, BookingEntity};
use crate::metrics::QueryTimer;

const CONTEXT_SELECT: &str = r#"
    SELECT b.id, b.user_id, b.provider_id, b.service_id, b.status, b.scheduled_at,
           b.total, b.accepted_at, b.cancelled_by, b.created_at, b.updated_at,
           s.name AS service_name, s.city, s.category
    FROM bookings b
    JOIN services s ON s.id = b.service_id
"#;

#[derive(FromRow)]
struct VolumeRow {
    user_id: Uuid,
    bookings: i64,
}

#[derive(FromRow)]
struct ResponseRow {
    provider_id: Uuid,
    responses: i64,
    avg_response_secs: f64,
}

#[derive(FromRow)]
struct TotalsRow {
    total: i64,
    completed: i64,
    revenue: i64,
}

/// Repository for booking database operations.
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_context(&self, id: Uuid) -> Result<Option<BookingContext>, sqlx::Error> {
        let sql = format!("{} WHERE b.id = $1", CONTEXT_SELECT);
        let row = sqlx::query_as::<_, BookingContextEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// ASSIGNED bookings with a provider whose scheduled time is before the cutoff.
    pub async fn list_overdue_assigned(
        &self,
        scheduled_before: DateTime<Utc>,
    ) -> Result<Vec<BookingContext>, sqlx::Error> {
        let sql = format!(
            "{} WHERE b.status = 'ASSIGNED' AND b.provider_id IS NOT NULL AND b.scheduled_at < $1 \
             ORDER BY b.scheduled_at ASC",
            CONTEXT_SELECT
        );
        let rows = sqlx::query_as::<_, BookingContextEntity>(&sql)
            .bind(scheduled_before)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Compare-and-set assignment. Returns the updated booking, or `None`
    /// when status or provider no longer match.
    pub async fn apply_assignment(
        &self,
        change: &AssignmentChange,
    ) -> Result<Option<Booking>, sqlx::Error> {
        let row = sqlx::query_as::<_, BookingEntity>(
            r#"
            UPDATE bookings
            SET provider_id = $4,
                status = $5,
                accepted_at = NULL,
                cancelled_by = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND status = $2
              AND provider_id IS NOT DISTINCT FROM $3
            RETURNING id, user_id, provider_id, service_id, status, scheduled_at, total,
                      accepted_at, cancelled_by, created_at, updated_at
            "#,
        )
        .bind(change.booking_id)
        .bind(change.expected_status.as_str())
        .bind(change.expected_provider)
        .bind(change.new_provider)
        .bind(change.new_status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn list_high_volume_bookers(
        &self,
        since: DateTime<Utc>,
        more_than: i64,
    ) -> Result<Vec<BookingVolume>, sqlx::Error> {
        let rows = sqlx::query_as::<_, VolumeRow>(
            r#"
            SELECT user_id, COUNT(*) AS bookings
            FROM bookings
            WHERE created_at >= $1
            GROUP BY user_id
            HAVING COUNT(*) > $2
            ORDER BY bookings DESC
            "#,
        )
        .bind(since)
        .bind(more_than)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| BookingVolume {
                user_id: r.user_id,
                bookings: r.bookings,
            })
            .collect())
    }

    /// Acceptance latency per provider for bookings created since the cutoff.
    pub async fn list_response_stats(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ResponseStats>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT provider_id,
                   COUNT(*) AS responses,
                   AVG(EXTRACT(EPOCH FROM (accepted_at - created_at)))::DOUBLE PRECISION
                       AS avg_response_secs
            FROM bookings
            WHERE provider_id IS NOT NULL
              AND accepted_at IS NOT NULL
              AND created_at >= $1
            GROUP BY provider_id
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ResponseStats {
                provider_id: r.provider_id,
                responses: r.responses,
                avg_response_secs: r.avg_response_secs,
            })
            .collect())
    }

    pub async fn list_service_areas(&self) -> Result<Vec<ServiceArea>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT city, category FROM services WHERE is_active ORDER BY city, category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(city, category)| ServiceArea { city, category })
            .collect())
    }

    pub async fn list_service_cities(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT DISTINCT city FROM services WHERE is_active ORDER BY city")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count_in_area(
        &self,
        area: &ServiceArea,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM bookings b
            JOIN services s ON s.id = b.service_id
            WHERE s.city = $1 AND s.category = $2 AND b.created_at >= $3
            "#,
        )
        .bind(&area.city)
        .bind(&area.category)
        .bind(since)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn count_in_city(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM bookings b
            JOIN services s ON s.id = b.service_id
            WHERE s.city = $1 AND b.created_at >= $2 AND b.created_at < $3
            "#,
        )
        .bind(city)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BookingSummary, sqlx::Error> {
        let timer = QueryTimer::new("booking_summary");

        let totals = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed,
                   COALESCE(SUM(total) FILTER (WHERE status = 'COMPLETED'), 0)::BIGINT AS revenue
            FROM bookings
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let by_city: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT s.city, COUNT(*)
            FROM bookings b
            JOIN services s ON s.id = b.service_id
            WHERE b.created_at >= $1 AND b.created_at < $2
            GROUP BY s.city
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let by_category: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT s.category, COUNT(*)
            FROM bookings b
            JOIN services s ON s.id = b.service_id
            WHERE b.created_at >= $1 AND b.created_at < $2
            GROUP BY s.category
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        timer.record();

        Ok(BookingSummary {
            total: totals.total,
            completed: totals.completed,
            revenue: totals.revenue,
            by_city: by_city.into_iter().collect(),
            by_category: by_category.into_iter().collect(),
        })
    }
}
