//! Operator alerts and the automated-action audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Severity of an operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(AlertLevel::Info),
            "WARNING" => Ok(AlertLevel::Warning),
            "CRITICAL" => Ok(AlertLevel::Critical),
            _ => Err(format!(
                "Invalid alert level: {}. Must be one of: INFO, WARNING, CRITICAL",
                s
            )),
        }
    }
}

/// Operator handling state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Unread,
    Read,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Unread => "UNREAD",
            AlertStatus::Read => "READ",
            AlertStatus::Resolved => "RESOLVED",
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNREAD" => Ok(AlertStatus::Unread),
            "READ" => Ok(AlertStatus::Read),
            "RESOLVED" => Ok(AlertStatus::Resolved),
            _ => Err(format!("Invalid alert status: {}", s)),
        }
    }
}

/// An operator-facing alert. Monitors never modify alerts after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemAlert {
    pub id: Uuid,
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub details: serde_json::Value,
    pub status: AlertStatus,
    /// Dedup key the alert was claimed under, if any.
    pub dedup_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an alert.
#[derive(Debug, Clone)]
pub struct NewSystemAlert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl NewSystemAlert {
    pub fn new(
        level: AlertLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            details,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::new(AlertLevel::Info, title, message, details)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::new(AlertLevel::Warning, title, message, details)
    }

    pub fn critical(title: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::new(AlertLevel::Critical, title, message, details)
    }
}

/// One entry of the append-only automation audit ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedActionLog {
    pub id: Uuid,
    pub module: String,
    pub trigger: String,
    pub action_taken: String,
    pub details: serde_json::Value,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for an audit entry.
#[derive(Debug, Clone)]
pub struct NewAutomatedAction {
    pub module: String,
    pub trigger: String,
    pub action_taken: String,
    pub details: serde_json::Value,
    pub success: bool,
}

impl NewAutomatedAction {
    /// A successful action, including detection-only outcomes.
    pub fn succeeded(
        module: impl Into<String>,
        trigger: impl Into<String>,
        action_taken: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            module: module.into(),
            trigger: trigger.into(),
            action_taken: action_taken.into(),
            details,
            success: true,
        }
    }

    /// An operational failure.
    pub fn failed(
        module: impl Into<String>,
        trigger: impl Into<String>,
        action_taken: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            module: module.into(),
            trigger: trigger.into(),
            action_taken: action_taken.into(),
            details: serde_json::json!({ "error": error.to_string() }),
            success: false,
        }
    }
}

/// Alert counts over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub info: i64,
    pub warning: i64,
    pub critical: i64,
    pub unread: i64,
}

impl AlertSummary {
    pub fn total(&self) -> i64 {
        self.info + self.warning + self.critical
    }

    /// Adds `count` alerts of one level and status.
    pub fn add(&mut self, level: AlertLevel, status: AlertStatus, count: i64) {
        match level {
            AlertLevel::Info => self.info += count,
            AlertLevel::Warning => self.warning += count,
            AlertLevel::Critical => self.critical += count,
        }
        if status == AlertStatus::Unread {
            self.unread += count;
        }
    }
}

/// Audit ledger counts over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
}
