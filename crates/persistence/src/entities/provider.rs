//! Provider entities.

use chrono::{DateTime, Utc};
use domain::models::{
    GeoFix, Provider, ProviderActivity, ProviderStatus, ProviderWarning,
};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the providers table.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderEntity {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub status: String,
    pub is_online: bool,
    pub verified: bool,
    pub skills: Vec<String>,
    pub zones: Vec<String>,
    pub on_time_pct: f64,
    pub completion_pct: f64,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ProviderEntity> for Provider {
    fn from(entity: ProviderEntity) -> Self {
        let location = match (
            entity.current_latitude,
            entity.current_longitude,
            entity.last_location_update,
        ) {
            (Some(latitude), Some(longitude), Some(recorded_at)) => Some(GeoFix {
                latitude,
                longitude,
                recorded_at,
            }),
            _ => None,
        };

        Provider {
            id: entity.id,
            name: entity.name,
            phone: entity.phone,
            status: entity
                .status
                .parse::<ProviderStatus>()
                .unwrap_or(ProviderStatus::Paused),
            is_online: entity.is_online,
            verified: entity.verified,
            skills: entity.skills,
            zones: entity.zones,
            on_time_pct: entity.on_time_pct,
            completion_pct: entity.completion_pct,
            location,
            created_at: entity.created_at,
        }
    }
}

/// Provider row with trailing booking counts.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderActivityEntity {
    #[sqlx(flatten)]
    pub provider: ProviderEntity,
    pub total_bookings: i64,
    pub completed_bookings: i64,
}

impl From<ProviderActivityEntity> for ProviderActivity {
    fn from(entity: ProviderActivityEntity) -> Self {
        ProviderActivity {
            provider: entity.provider.into(),
            total_bookings: entity.total_bookings,
            completed_bookings: entity.completed_bookings,
        }
    }
}

/// Database row mapping for the provider_warnings table.
#[derive(Debug, Clone, FromRow)]
pub struct ProviderWarningEntity {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub reason: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ProviderWarningEntity> for ProviderWarning {
    fn from(entity: ProviderWarningEntity) -> Self {
        ProviderWarning {
            id: entity.id,
            provider_id: entity.provider_id,
            reason: entity.reason,
            details: entity.details,
            created_at: entity.created_at,
        }
    }
}
