//! Autonomous monitors.
//!
//! Each monitor owns one area of the marketplace and exposes its operations
//! as async methods returning [`MonitorResult`]. Monitors do not write
//! failure audit entries themselves: the scheduler, the event router and
//! the control facade wrap every call in an error boundary that does.

pub mod flow;
pub mod growth;
pub mod reporting;
pub mod scout;
pub mod security;

use std::sync::Arc;

use chrono_tz::Tz;
use domain::services::{MarketplaceStore, NotificationPort, NotificationResult, StoreError};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::services::AlertSink;

pub use flow::FlowMonitor;
pub use growth::GrowthMonitor;
pub use reporting::ReportingMonitor;
pub use scout::ScoutMonitor;
pub use security::SecurityMonitor;

/// Errors raised by monitor operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

/// Collaborators shared by every monitor.
#[derive(Clone)]
pub struct MonitorDeps {
    pub store: Arc<dyn MarketplaceStore>,
    pub sink: AlertSink,
    pub notifier: Arc<dyn NotificationPort>,
}

impl MonitorDeps {
    pub fn new(store: Arc<dyn MarketplaceStore>, notifier: Arc<dyn NotificationPort>) -> Self {
        Self {
            sink: AlertSink::new(Arc::clone(&store)),
            store,
            notifier,
        }
    }

    /// Sends a message, logging instead of failing when the transport does.
    pub(crate) async fn notify(&self, destination: &str, message: &str) -> bool {
        match self.notifier.send(destination, message).await {
            NotificationResult::Sent => true,
            NotificationResult::Skipped => false,
            NotificationResult::Failed(reason) => {
                warn!(destination = %destination, reason = %reason, "Notification failed");
                false
            }
        }
    }

    /// Sends a message to a user's phone, if the user can be found.
    pub(crate) async fn notify_user(&self, user_id: Uuid, message: &str) -> bool {
        match self.store.get_user(user_id).await {
            Ok(Some(user)) => self.notify(&user.phone, message).await,
            Ok(None) => {
                warn!(user_id = %user_id, "Cannot notify unknown user");
                false
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "User lookup for notification failed");
                false
            }
        }
    }
}

/// Settings that shape monitor behavior.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Zone used for calendar boundaries such as the report week.
    pub timezone: Tz,
    /// Upper bound on outbound bulk messages per second.
    pub notification_rate_per_second: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Kathmandu,
            notification_rate_per_second: 1,
        }
    }
}

/// The full set of monitors, built over one set of collaborators.
pub struct Monitors {
    pub flow: FlowMonitor,
    pub security: SecurityMonitor,
    pub scout: ScoutMonitor,
    pub growth: GrowthMonitor,
    pub reporting: ReportingMonitor,
}

impl Monitors {
    pub fn new(deps: MonitorDeps, settings: &MonitorSettings) -> Self {
        Self {
            flow: FlowMonitor::new(deps.clone()),
            security: SecurityMonitor::new(deps.clone()),
            scout: ScoutMonitor::new(deps.clone()),
            growth: GrowthMonitor::new(deps.clone(), settings.notification_rate_per_second),
            reporting: ReportingMonitor::new(deps, settings.timezone),
        }
    }
}
