//! Supply and demand models used by capacity and opportunity analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A (city, category) pair with at least one active service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceArea {
    pub city: String,
    pub category: String,
}

/// Running count of searches for a service that is not offered in a city.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequestLog {
    pub id: Uuid,
    /// Normalized search term.
    pub search_term: String,
    pub city: String,
    pub count: i64,
    pub last_searched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
