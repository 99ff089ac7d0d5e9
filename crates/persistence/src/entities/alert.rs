//! System alert and automated action log entities.

use chrono::{DateTime, Utc};
use domain::models::{AlertLevel, AlertStatus, AutomatedActionLog, SystemAlert};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the system_alerts table.
#[derive(Debug, Clone, FromRow)]
pub struct SystemAlertEntity {
    pub id: Uuid,
    pub level: String,
    pub title: String,
    pub message: String,
    pub details: serde_json::Value,
    pub status: String,
    pub dedup_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SystemAlertEntity> for SystemAlert {
    fn from(entity: SystemAlertEntity) -> Self {
        SystemAlert {
            id: entity.id,
            level: entity.level.parse::<AlertLevel>().unwrap_or(AlertLevel::Info),
            title: entity.title,
            message: entity.message,
            details: entity.details,
            status: entity
                .status
                .parse::<AlertStatus>()
                .unwrap_or(AlertStatus::Unread),
            dedup_key: entity.dedup_key,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the automated_action_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct AutomatedActionLogEntity {
    pub id: Uuid,
    pub module: String,
    pub trigger: String,
    pub action_taken: String,
    pub details: serde_json::Value,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AutomatedActionLogEntity> for AutomatedActionLog {
    fn from(entity: AutomatedActionLogEntity) -> Self {
        AutomatedActionLog {
            id: entity.id,
            module: entity.module,
            trigger: entity.trigger,
            action_taken: entity.action_taken,
            details: entity.details,
            success: entity.success,
            created_at: entity.created_at,
        }
    }
}
