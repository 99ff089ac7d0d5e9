//! Alert and audit sink shared by every monitor.
//!
//! Writing an alert or an audit entry must never fail the action that
//! produced it, so every method here logs storage errors and swallows them.

use std::fmt::Display;
use std::sync::Arc;

use chrono::Duration;
use domain::models::{NewAutomatedAction, NewSystemAlert, SystemAlert};
use domain::services::{DedupClaim, MarketplaceStore};
use tracing::{error, info};

/// Appends operator alerts and automated-action audit entries.
#[derive(Clone)]
pub struct AlertSink {
    store: Arc<dyn MarketplaceStore>,
}

impl AlertSink {
    pub fn new(store: Arc<dyn MarketplaceStore>) -> Self {
        Self { store }
    }

    /// Appends an alert. Returns `None` if the store rejected it.
    pub async fn create_system_alert(&self, alert: NewSystemAlert) -> Option<SystemAlert> {
        let title = alert.title.clone();
        match self.store.insert_alert(alert).await {
            Ok(created) => {
                record_alert(&created);
                Some(created)
            }
            Err(e) => {
                error!(title = %title, error = %e, "Failed to create system alert");
                None
            }
        }
    }

    /// Appends an alert unless `dedup_key` was claimed within the window.
    ///
    /// Returns `None` when the alert was suppressed or could not be stored.
    pub async fn create_system_alert_once(
        &self,
        alert: NewSystemAlert,
        dedup_key: impl Into<String>,
        window: Duration,
    ) -> Option<SystemAlert> {
        let claim = DedupClaim::for_window(dedup_key, window);
        let title = alert.title.clone();
        match self.store.insert_alert_once(alert, &claim).await {
            Ok(Some(created)) => {
                record_alert(&created);
                Some(created)
            }
            Ok(None) => {
                info!(title = %title, dedup_key = %claim.key, "Alert suppressed by dedup window");
                None
            }
            Err(e) => {
                error!(title = %title, dedup_key = %claim.key, error = %e, "Failed to create system alert");
                None
            }
        }
    }

    /// Appends an audit entry.
    pub async fn log_automated_action(&self, action: NewAutomatedAction) {
        let module = action.module.clone();
        let success = action.success;
        match self.store.insert_action(action).await {
            Ok(entry) => {
                metrics::counter!(
                    "ops_actions_logged_total",
                    "module" => module,
                    "success" => if success { "true" } else { "false" }
                )
                .increment(1);
                tracing::debug!(action_id = %entry.id, "Automated action logged");
            }
            Err(e) => {
                error!(module = %module, error = %e, "Failed to log automated action");
            }
        }
    }

    /// Appends a `success = false` audit entry carrying the error text.
    pub async fn log_failure(
        &self,
        module: &str,
        trigger: &str,
        action: &str,
        error: &(dyn Display + Sync),
    ) {
        self.log_automated_action(NewAutomatedAction::failed(module, trigger, action, error))
            .await;
    }
}

fn record_alert(alert: &SystemAlert) {
    metrics::counter!("ops_alerts_created_total", "level" => alert.level.as_str()).increment(1);
    info!(
        alert_id = %alert.id,
        level = %alert.level,
        title = %alert.title,
        "System alert created"
    );
}
