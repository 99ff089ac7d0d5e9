//! Booking entities.

use chrono::{DateTime, Utc};
use domain::models::{Booking, BookingContext, BookingStatus, CancellationSource};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the bookings table.
#[derive(Debug, Clone, FromRow)]
pub struct BookingEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub service_id: Uuid,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub total: i64,
    pub accepted_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookingEntity> for Booking {
    fn from(entity: BookingEntity) -> Self {
        Booking {
            id: entity.id,
            user_id: entity.user_id,
            provider_id: entity.provider_id,
            service_id: entity.service_id,
            status: entity
                .status
                .parse::<BookingStatus>()
                .unwrap_or(BookingStatus::Pending),
            scheduled_at: entity.scheduled_at,
            total: entity.total,
            accepted_at: entity.accepted_at,
            cancelled_by: entity
                .cancelled_by
                .and_then(|s| s.parse::<CancellationSource>().ok()),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// A booking row joined with its service.
#[derive(Debug, Clone, FromRow)]
pub struct BookingContextEntity {
    #[sqlx(flatten)]
    pub booking: BookingEntity,
    pub service_name: String,
    pub city: String,
    pub category: String,
}

impl From<BookingContextEntity> for BookingContext {
    fn from(entity: BookingContextEntity) -> Self {
        BookingContext {
            booking: entity.booking.into(),
            service_name: entity.service_name,
            city: entity.city,
            category: entity.category,
        }
    }
}
