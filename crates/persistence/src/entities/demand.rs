//! Service request log entity.

use chrono::{DateTime, Utc};
use domain::models::ServiceRequestLog;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the service_request_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRequestLogEntity {
    pub id: Uuid,
    pub search_term: String,
    pub city: String,
    pub count: i64,
    pub last_searched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<ServiceRequestLogEntity> for ServiceRequestLog {
    fn from(entity: ServiceRequestLogEntity) -> Self {
        ServiceRequestLog {
            id: entity.id,
            search_term: entity.search_term,
            city: entity.city,
            count: entity.count,
            last_searched_at: entity.last_searched_at,
            created_at: entity.created_at,
        }
    }
}
