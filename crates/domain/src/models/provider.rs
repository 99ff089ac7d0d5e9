//! Service provider domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Whether a provider may receive work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Active,
    Paused,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Active => "ACTIVE",
            ProviderStatus::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ProviderStatus::Active),
            "PAUSED" => Ok(ProviderStatus::Paused),
            _ => Err(format!(
                "Invalid provider status: {}. Must be one of: ACTIVE, PAUSED",
                s
            )),
        }
    }
}

/// A location fix reported by a provider's device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A service provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub status: ProviderStatus,
    pub is_online: bool,
    pub verified: bool,
    /// Service categories this provider can perform.
    pub skills: Vec<String>,
    /// Cities this provider covers.
    pub zones: Vec<String>,
    pub on_time_pct: f64,
    pub completion_pct: f64,
    /// Last known location, with the time it was reported.
    pub location: Option<GeoFix>,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    /// Check if the provider has the skill and coverage for a job.
    pub fn covers(&self, category: &str, city: &str) -> bool {
        self.skills.iter().any(|s| s == category) && self.zones.iter().any(|z| z == city)
    }

    /// Check if the provider can take a new assignment right now.
    pub fn is_available(&self) -> bool {
        self.status == ProviderStatus::Active && self.is_online
    }
}

/// Orders replacement candidates best first: on-time percentage
/// descending, then completion percentage descending.
pub fn rank_candidates(providers: &mut [Provider]) {
    providers.sort_by(|a, b| {
        b.on_time_pct
            .total_cmp(&a.on_time_pct)
            .then_with(|| b.completion_pct.total_cmp(&a.completion_pct))
    });
}

/// A warning recorded against a provider when a monitor pauses them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderWarning {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub reason: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a provider warning.
#[derive(Debug, Clone)]
pub struct NewProviderWarning {
    pub provider_id: Uuid,
    pub reason: String,
    pub details: serde_json::Value,
}

/// A provider together with its booking volume in a trailing window.
#[derive(Debug, Clone)]
pub struct ProviderActivity {
    pub provider: Provider,
    pub total_bookings: i64,
    pub completed_bookings: i64,
}

impl ProviderActivity {
    /// Completed share of window bookings as a percentage, if any bookings.
    pub fn completion_rate(&self) -> Option<f64> {
        if self.total_bookings == 0 {
            None
        } else {
            Some(self.completed_bookings as f64 / self.total_bookings as f64 * 100.0)
        }
    }
}

/// Number of providers recruited in a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCount {
    pub zone: String,
    pub providers: i64,
}

/// Provider signup figures for providers created since a cutoff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStats {
    pub signups: i64,
    pub verified: i64,
    /// Signups with at least one completed booking.
    pub activated: i64,
    /// Most common coverage zones among signups, largest first.
    pub top_zones: Vec<ZoneCount>,
}

impl OnboardingStats {
    pub fn verification_rate(&self) -> f64 {
        percentage(self.verified, self.signups)
    }

    pub fn activation_rate(&self) -> f64 {
        percentage(self.activated, self.signups)
    }
}

/// Provider aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub new_providers: i64,
    pub active_providers: i64,
    pub verified_providers: i64,
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
