//! Control facade for the operations engine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use domain::models::{GeoFix, ServiceRequestLog};
use domain::services::{MarketplaceStore, NotificationPort};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::events::{DispatchStats, EventRouter, FailureLabels, HandlerTable, MutationHook};
use crate::jobs::scheduler::parse_expression;
use crate::jobs::{
    Job, JobOutput, JobScheduler, JobStatus, MonitorJob, MonitorTask, SchedulerError,
};
use crate::monitors::flow::{CancellationOutcome, PerformanceOutcome, ReviewEvent};
use crate::monitors::growth::{ReferralOutcome, WelcomeOutcome};
use crate::monitors::security::{LocationOutcome, LocationUpdate, PhoneAbuseOutcome};
use crate::monitors::{
    flow, growth, scout, security, MonitorDeps, MonitorError, MonitorResult, MonitorSettings,
    Monitors,
};
use crate::services::AlertSink;

/// Runtime settings for [`OpsEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// When false, `init` leaves jobs and the event router stopped.
    pub enabled: bool,
    pub timezone: Tz,
    pub event_queue_capacity: usize,
    pub notification_rate_per_second: u32,
    /// Cron expressions keyed by job name, replacing the defaults.
    pub schedule_overrides: HashMap<String, String>,
    pub shutdown_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: chrono_tz::Asia::Kathmandu,
            event_queue_capacity: 1024,
            notification_rate_per_second: 1,
            schedule_overrides: HashMap::new(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub initialized: bool,
    pub enabled: bool,
    pub timezone: String,
    pub scheduled_jobs: Vec<JobStatus>,
    pub uptime_secs: Option<i64>,
    pub event_stats: DispatchStats,
}

/// Owns the monitors, the scheduler and the event router.
pub struct OpsEngine {
    settings: EngineSettings,
    store: Arc<dyn MarketplaceStore>,
    sink: AlertSink,
    monitors: Arc<Monitors>,
    scheduler: JobScheduler,
    router: EventRouter,
    started_at: RwLock<Option<DateTime<Utc>>>,
    init_lock: Mutex<()>,
}

impl OpsEngine {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        notifier: Arc<dyn NotificationPort>,
        settings: EngineSettings,
    ) -> Self {
        let deps = MonitorDeps::new(Arc::clone(&store), notifier);
        let sink = deps.sink.clone();
        let monitors = Arc::new(Monitors::new(
            deps,
            &MonitorSettings {
                timezone: settings.timezone,
                notification_rate_per_second: settings.notification_rate_per_second,
            },
        ));
        let handlers = HandlerTable::standard(Arc::clone(&monitors), Arc::clone(&store));

        Self {
            scheduler: JobScheduler::new(settings.timezone, sink.clone()),
            router: EventRouter::new(settings.event_queue_capacity, handlers, sink.clone()),
            settings,
            store,
            sink,
            monitors,
            started_at: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Register the job table and start timers and event dispatch.
    /// Safe to call more than once.
    pub async fn init(&self) -> Result<(), SchedulerError> {
        let _guard = self.init_lock.lock().await;
        if self.started_at.read().await.is_some() {
            return Ok(());
        }
        if !self.settings.enabled {
            info!("Operations engine disabled; jobs and event dispatch not started");
            return Ok(());
        }

        let overrides = &self.settings.schedule_overrides;
        for name in overrides.keys() {
            if MonitorTask::from_name(name).is_none() {
                warn!(job = %name, "Schedule override does not match a monitor job");
            }
        }

        let table = MonitorTask::ALL.map(|task| (task, task.expression(overrides)));
        for (task, expression) in table {
            parse_expression(expression).map_err(|e| SchedulerError::InvalidSchedule {
                name: task.name().to_string(),
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        }

        let registered: Vec<String> = self
            .scheduler
            .status()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        for (task, expression) in table {
            if registered.iter().any(|name| name == task.name()) {
                continue;
            }
            let job = Arc::new(MonitorJob::new(task, Arc::clone(&self.monitors)));
            self.scheduler.schedule(task.name(), expression, job).await?;
        }

        self.scheduler.start().await;
        self.router.start().await;
        *self.started_at.write().await = Some(Utc::now());

        info!(
            timezone = %self.settings.timezone,
            jobs = MonitorTask::ALL.len(),
            "Operations engine initialized"
        );
        Ok(())
    }

    /// Stop timers and event dispatch, waiting up to `timeout` for each.
    /// Event dispatch does not resume after a later `init`.
    pub async fn shutdown(&self, timeout: Duration) {
        let _guard = self.init_lock.lock().await;
        self.scheduler.stop_all();
        self.scheduler.wait_for_shutdown(timeout).await;
        self.router.shutdown(timeout).await;
        *self.started_at.write().await = None;
        info!("Operations engine stopped");
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.settings.shutdown_timeout
    }

    pub async fn status(&self) -> EngineStatus {
        let started_at = *self.started_at.read().await;
        EngineStatus {
            initialized: started_at.is_some(),
            enabled: self.settings.enabled,
            timezone: self.settings.timezone.name().to_string(),
            scheduled_jobs: self.scheduler.status().await,
            uptime_secs: started_at.map(|at| (Utc::now() - at).num_seconds()),
            event_stats: self.router.dispatch_stats(),
        }
    }

    /// Run a scheduled job now.
    pub async fn trigger_job(&self, name: &str) -> Result<JobOutput, SchedulerError> {
        let Some(task) = MonitorTask::from_name(name) else {
            return self.scheduler.trigger(name).await;
        };
        if self.scheduler.status().await.iter().all(|s| s.name != task.name()) {
            // Not registered yet: engine disabled or not initialized.
            let job = Arc::new(MonitorJob::new(task, Arc::clone(&self.monitors)));
            let expression = task.expression(&self.settings.schedule_overrides);
            match self.scheduler.schedule(task.name(), expression, job).await {
                Ok(()) | Err(SchedulerError::DuplicateJob(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.scheduler.trigger(task.name()).await
    }

    /// Schedule a job alongside the monitor table. Its timer starts right
    /// away when the engine is already running, otherwise on `init`.
    pub async fn register_job(
        &self,
        name: &str,
        expression: &str,
        job: Arc<dyn Job>,
    ) -> Result<(), SchedulerError> {
        let _guard = self.init_lock.lock().await;
        let expression = self
            .settings
            .schedule_overrides
            .get(name)
            .map(String::as_str)
            .unwrap_or(expression);
        self.scheduler.schedule(name, expression, job).await?;
        if self.started_at.read().await.is_some() {
            self.scheduler.start().await;
        }
        Ok(())
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Hook for the marketplace data layer to report mutations.
    pub fn hook(&self) -> &dyn MutationHook {
        &self.router
    }

    pub fn monitors(&self) -> &Monitors {
        &self.monitors
    }

    pub fn store(&self) -> Arc<dyn MarketplaceStore> {
        Arc::clone(&self.store)
    }

    async fn guarded<T>(
        &self,
        labels: FailureLabels,
        operation: impl Future<Output = MonitorResult<T>>,
    ) -> MonitorResult<T> {
        match operation.await {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(module = labels.module, error = %e, "{}", labels.action);
                self.sink
                    .log_failure(labels.module, labels.trigger, labels.action, &e)
                    .await;
                Err(e)
            }
        }
    }

    pub async fn trigger_welcome_message(
        &self,
        user_id: Uuid,
        phone: &str,
    ) -> MonitorResult<WelcomeOutcome> {
        let labels = FailureLabels {
            module: growth::MODULE,
            trigger: "Manual welcome message",
            action: "Failed to send welcome message",
        };
        self.guarded(labels, self.monitors.growth.send_welcome_message(user_id, phone))
            .await
    }

    pub async fn trigger_performance_check(
        &self,
        review: ReviewEvent,
    ) -> MonitorResult<PerformanceOutcome> {
        let labels = FailureLabels {
            module: flow::MODULE,
            trigger: "Manual performance check",
            action: "Failed to check provider performance",
        };
        self.guarded(labels, self.monitors.flow.monitor_provider_performance(review))
            .await
    }

    pub async fn trigger_phone_abuse_check(
        &self,
        user_id: Uuid,
        phone: &str,
        booking_id: Option<Uuid>,
    ) -> MonitorResult<PhoneAbuseOutcome> {
        let labels = FailureLabels {
            module: security::MODULE,
            trigger: "Manual phone abuse check",
            action: "Failed to check phone number abuse",
        };
        self.guarded(
            labels,
            self.monitors
                .security
                .check_phone_number_abuse(user_id, phone, booking_id),
        )
        .await
    }

    /// Checks a reported position against the provider's stored location,
    /// treating the report as taken now.
    pub async fn trigger_fake_location_check(
        &self,
        provider_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> MonitorResult<LocationOutcome> {
        let labels = FailureLabels {
            module: security::MODULE,
            trigger: "Manual location check",
            action: "Failed to check location plausibility",
        };
        self.guarded(labels, async {
            let provider = self
                .store
                .get_provider(provider_id)
                .await?
                .ok_or_else(|| MonitorError::NotFound(format!("provider {}", provider_id)))?;
            let update = LocationUpdate {
                provider_id,
                previous: provider.location,
                current: GeoFix {
                    latitude,
                    longitude,
                    recorded_at: Utc::now(),
                },
            };
            self.monitors.security.check_fake_location(update).await
        })
        .await
    }

    pub async fn trigger_provider_cancellation(
        &self,
        booking_id: Uuid,
    ) -> MonitorResult<CancellationOutcome> {
        let labels = FailureLabels {
            module: flow::MODULE,
            trigger: "Manual provider cancellation",
            action: "Failed to handle provider cancellation",
        };
        self.guarded(labels, self.monitors.flow.handle_provider_cancellation(booking_id))
            .await
    }

    pub async fn log_unavailable_service(
        &self,
        search_term: &str,
        city: &str,
        user_id: Option<Uuid>,
    ) -> MonitorResult<ServiceRequestLog> {
        let labels = FailureLabels {
            module: scout::MODULE,
            trigger: "Unavailable service search",
            action: "Failed to log unavailable service request",
        };
        self.guarded(
            labels,
            self.monitors
                .scout
                .log_unavailable_service_request(search_term, city, user_id),
        )
        .await
    }

    pub async fn trigger_referral_reward(
        &self,
        referral_id: Uuid,
        booking_amount: i64,
    ) -> MonitorResult<ReferralOutcome> {
        let labels = FailureLabels {
            module: growth::MODULE,
            trigger: "Manual referral reward",
            action: "Failed to process referral reward",
        };
        self.guarded(
            labels,
            self.monitors
                .growth
                .process_referral_reward(referral_id, booking_amount),
        )
        .await
    }
}
