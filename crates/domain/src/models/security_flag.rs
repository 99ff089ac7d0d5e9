//! Security flag domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of suspicious activity a flag records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagType {
    PotentialAbuse,
    FakeLocation,
    ExcessiveBookings,
    AutomatedResponses,
}

impl FlagType {
    /// Types that age out automatically when nobody reviews them.
    pub const LOW_PRIORITY: [FlagType; 2] =
        [FlagType::ExcessiveBookings, FlagType::AutomatedResponses];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::PotentialAbuse => "POTENTIAL_ABUSE",
            FlagType::FakeLocation => "FAKE_LOCATION",
            FlagType::ExcessiveBookings => "EXCESSIVE_BOOKINGS",
            FlagType::AutomatedResponses => "AUTOMATED_RESPONSES",
        }
    }

    pub fn is_low_priority(&self) -> bool {
        Self::LOW_PRIORITY.contains(self)
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FlagType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POTENTIAL_ABUSE" => Ok(FlagType::PotentialAbuse),
            "FAKE_LOCATION" => Ok(FlagType::FakeLocation),
            "EXCESSIVE_BOOKINGS" => Ok(FlagType::ExcessiveBookings),
            "AUTOMATED_RESPONSES" => Ok(FlagType::AutomatedResponses),
            _ => Err(format!("Invalid security flag type: {}", s)),
        }
    }
}

/// Review state of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagStatus {
    PendingReview,
    Dismissed,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::PendingReview => "PENDING_REVIEW",
            FlagStatus::Dismissed => "DISMISSED",
        }
    }
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FlagStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_REVIEW" => Ok(FlagStatus::PendingReview),
            "DISMISSED" => Ok(FlagStatus::Dismissed),
            _ => Err(format!("Invalid security flag status: {}", s)),
        }
    }
}

/// The account a flag is raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum FlagSubject {
    User(Uuid),
    Provider(Uuid),
}

impl FlagSubject {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            FlagSubject::User(id) => Some(*id),
            FlagSubject::Provider(_) => None,
        }
    }

    pub fn provider_id(&self) -> Option<Uuid> {
        match self {
            FlagSubject::Provider(id) => Some(*id),
            FlagSubject::User(_) => None,
        }
    }
}

/// A security flag awaiting (or past) review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityFlag {
    pub id: Uuid,
    pub subject: FlagSubject,
    pub flag_type: FlagType,
    pub status: FlagStatus,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Input for raising a flag. New flags start in `PENDING_REVIEW`.
#[derive(Debug, Clone)]
pub struct NewSecurityFlag {
    pub subject: FlagSubject,
    pub flag_type: FlagType,
    pub details: serde_json::Value,
}

/// Response-time figures for one provider over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStats {
    pub provider_id: Uuid,
    /// Accepted bookings in the window.
    pub responses: i64,
    /// Mean of `accepted_at - created_at` in seconds.
    pub avg_response_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_priority_types() {
        assert!(FlagType::ExcessiveBookings.is_low_priority());
        assert!(FlagType::AutomatedResponses.is_low_priority());
        assert!(!FlagType::PotentialAbuse.is_low_priority());
        assert!(!FlagType::FakeLocation.is_low_priority());
    }

    #[test]
    fn test_flag_type_parse() {
        assert_eq!(
            "FAKE_LOCATION".parse::<FlagType>(),
            Ok(FlagType::FakeLocation)
        );
        assert!("SPAM".parse::<FlagType>().is_err());
    }

    #[test]
    fn test_subject_accessors() {
        let id = Uuid::new_v4();
        assert_eq!(FlagSubject::User(id).user_id(), Some(id));
        assert_eq!(FlagSubject::User(id).provider_id(), None);
        assert_eq!(FlagSubject::Provider(id).provider_id(), Some(id));
    }

    #[test]
    fn test_subject_serialization() {
        let id = Uuid::nil();
        let json = serde_json::to_value(FlagSubject::Provider(id)).unwrap();
        assert_eq!(json["kind"], "provider");
    }
}
