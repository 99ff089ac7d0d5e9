//! Booking domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Booking Status Enum
// ============================================================================

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Assigned => "ASSIGNED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "ASSIGNED" => Ok(BookingStatus::Assigned),
            "IN_PROGRESS" => Ok(BookingStatus::InProgress),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            _ => Err(format!(
                "Invalid booking status: {}. Must be one of: PENDING, ASSIGNED, IN_PROGRESS, COMPLETED, CANCELLED",
                s
            )),
        }
    }
}

/// Who cancelled a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationSource {
    Customer,
    Provider,
    System,
}

impl CancellationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationSource::Customer => "CUSTOMER",
            CancellationSource::Provider => "PROVIDER",
            CancellationSource::System => "SYSTEM",
        }
    }
}

impl fmt::Display for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CancellationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(CancellationSource::Customer),
            "PROVIDER" => Ok(CancellationSource::Provider),
            "SYSTEM" => Ok(CancellationSource::System),
            _ => Err(format!("Invalid cancellation source: {}", s)),
        }
    }
}

// ============================================================================
// Core Models
// ============================================================================

/// A bookable service offered in one city under one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub city: String,
    pub is_active: bool,
}

/// A customer booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub service_id: Uuid,
    pub status: BookingStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Total price in whole currency units.
    pub total: i64,
    /// When the assigned provider accepted the booking.
    pub accepted_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancellationSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whole minutes elapsed since the scheduled time, if scheduled.
    pub fn delay_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.scheduled_at
            .map(|scheduled| (now - scheduled).num_minutes())
    }

    /// Seconds between creation and provider acceptance.
    pub fn response_time_secs(&self) -> Option<f64> {
        self.accepted_at
            .map(|accepted| (accepted - self.created_at).num_milliseconds() as f64 / 1000.0)
    }

    /// True when this booking is cancelled and the provider cancelled it.
    pub fn is_cancelled_by_provider(&self) -> bool {
        self.status == BookingStatus::Cancelled
            && self.cancelled_by == Some(CancellationSource::Provider)
    }
}

/// A booking joined with the city and category of its service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingContext {
    pub booking: Booking,
    pub service_name: String,
    pub city: String,
    pub category: String,
}

/// Compare-and-set change of a booking's assignment.
///
/// Applied only while the booking still has `expected_status` and
/// `expected_provider`; otherwise the store reports no change.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentChange {
    pub booking_id: Uuid,
    pub expected_status: BookingStatus,
    pub expected_provider: Option<Uuid>,
    pub new_status: BookingStatus,
    pub new_provider: Option<Uuid>,
}

impl AssignmentChange {
    /// Moves an assigned booking from one provider to another.
    pub fn reassign(booking: &Booking, to: Uuid) -> Self {
        Self {
            booking_id: booking.id,
            expected_status: booking.status,
            expected_provider: booking.provider_id,
            new_status: BookingStatus::Assigned,
            new_provider: Some(to),
        }
    }

    /// Clears the provider and puts the booking back in the pending pool.
    pub fn release(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            expected_status: booking.status,
            expected_provider: booking.provider_id,
            new_status: BookingStatus::Pending,
            new_provider: None,
        }
    }
}

/// Booking aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub total: i64,
    pub completed: i64,
    /// Sum of totals of completed bookings.
    pub revenue: i64,
    pub by_city: BTreeMap<String, i64>,
    pub by_category: BTreeMap<String, i64>,
}

impl BookingSummary {
    /// Completed share of all bookings as a percentage.
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }

    /// Average revenue per completed booking.
    pub fn average_order_value(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.revenue as f64 / self.completed as f64
        }
    }
}
