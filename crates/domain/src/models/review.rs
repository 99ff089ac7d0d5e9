//! Review domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ratings strictly below this value count as low.
pub const LOW_RATING_THRESHOLD: i16 = 3;

/// A customer review of a completed booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider_id: Uuid,
    /// 1 to 5 stars.
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn is_low(&self) -> bool {
        self.rating < LOW_RATING_THRESHOLD
    }
}

/// Review aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub count: i64,
    pub average_rating: Option<f64>,
    /// Number of reviews per star, index 0 holds one-star reviews.
    pub distribution: [i64; 5],
}

impl ReviewSummary {
    /// Builds a summary from raw ratings; out-of-range values are ignored.
    pub fn from_ratings<I: IntoIterator<Item = i16>>(ratings: I) -> Self {
        let mut summary = ReviewSummary::default();
        let mut sum = 0i64;
        for rating in ratings {
            if !(1..=5).contains(&rating) {
                continue;
            }
            summary.count += 1;
            sum += rating as i64;
            summary.distribution[(rating - 1) as usize] += 1;
        }
        if summary.count > 0 {
            summary.average_rating = Some(sum as f64 / summary.count as f64);
        }
        summary
    }
}
