//! Security flag entity.

use chrono::{DateTime, Utc};
use domain::models::{FlagStatus, FlagSubject, FlagType, SecurityFlag};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the security_flags table.
///
/// Exactly one of `user_id` and `provider_id` is set (enforced by a check
/// constraint).
#[derive(Debug, Clone, FromRow)]
pub struct SecurityFlagEntity {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub flag_type: String,
    pub status: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<SecurityFlagEntity> for SecurityFlag {
    fn from(entity: SecurityFlagEntity) -> Self {
        let subject = match (entity.user_id, entity.provider_id) {
            (_, Some(provider_id)) => FlagSubject::Provider(provider_id),
            (Some(user_id), None) => FlagSubject::User(user_id),
            (None, None) => FlagSubject::User(Uuid::nil()),
        };

        SecurityFlag {
            id: entity.id,
            subject,
            flag_type: entity
                .flag_type
                .parse::<FlagType>()
                .unwrap_or(FlagType::PotentialAbuse),
            status: entity
                .status
                .parse::<FlagStatus>()
                .unwrap_or(FlagStatus::PendingReview),
            details: entity.details,
            created_at: entity.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_subject() {
        let provider_id = Uuid::new_v4();
        let flag: SecurityFlag = SecurityFlagEntity {
            id: Uuid::new_v4(),
            user_id: None,
            provider_id: Some(provider_id),
            flag_type: "FAKE_LOCATION".into(),
            status: "PENDING_REVIEW".into(),
            details: serde_json::json!({ "speedKmh": 850.0 }),
            created_at: Utc::now(),
        }
        .into();

        assert_eq!(flag.subject, FlagSubject::Provider(provider_id));
        assert_eq!(flag.flag_type, FlagType::FakeLocation);
        assert_eq!(flag.status, FlagStatus::PendingReview);
    }
}
