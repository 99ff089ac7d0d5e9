//! Calendar job scheduler for monitor runs.
//!
//! Every job gets its own timer task that sleeps until the next fire time
//! of its cron expression in the engine timezone. Executions run in their
//! own task so a failing or panicking job never takes its timer (or any
//! other job) down with it.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::monitors::MonitorError;
use crate::services::AlertSink;

/// Summary a job hands back to whoever triggered it.
pub type JobOutput = serde_json::Value;

/// Trait for implementing scheduled jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Monitor module credited in failure audit entries.
    fn module(&self) -> &'static str;

    /// Trigger text of the failure audit entry.
    fn failure_trigger(&self) -> &'static str {
        "Scheduled job"
    }

    /// Action text of the failure audit entry.
    fn failure_action(&self) -> &'static str {
        "Job execution failed"
    }

    async fn execute(&self) -> Result<JobOutput, MonitorError>;
}

/// Errors raised by the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid schedule '{expression}' for job {name}: {reason}")]
    InvalidSchedule {
        name: String,
        expression: String,
        reason: String,
    },

    #[error("Job already registered: {0}")]
    DuplicateJob(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job {name} failed: {message}")]
    JobFailed { name: String, message: String },
}

/// Point-in-time view of one registered job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub name: String,
    pub expression: String,
    /// True while the job's timer task is alive.
    pub running: bool,
    pub next_run: Option<DateTime<Utc>>,
}

struct Registration {
    name: String,
    expression: String,
    schedule: Schedule,
    job: Arc<dyn Job>,
}

struct Timer {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Parses a 5-, 6- or 7-field cron expression. Five-field expressions get
/// a seconds field of `0`.
pub fn parse_expression(expression: &str) -> Result<Schedule, cron::error::Error> {
    let fields = expression.split_whitespace().count();
    if fields == 5 {
        Schedule::from_str(&format!("0 {}", expression.trim()))
    } else {
        Schedule::from_str(expression.trim())
    }
}

/// Background job scheduler.
pub struct JobScheduler {
    timezone: Tz,
    sink: AlertSink,
    jobs: RwLock<BTreeMap<String, Arc<Registration>>>,
    timers: Mutex<HashMap<String, Timer>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl JobScheduler {
    /// Create a scheduler interpreting every expression in `timezone`.
    pub fn new(timezone: Tz, sink: AlertSink) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            timezone,
            sink,
            jobs: RwLock::new(BTreeMap::new()),
            timers: Mutex::new(HashMap::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Register a job under `name`.
    pub async fn schedule(
        &self,
        name: &str,
        expression: &str,
        job: Arc<dyn Job>,
    ) -> Result<(), SchedulerError> {
        let schedule = parse_expression(expression).map_err(|e| SchedulerError::InvalidSchedule {
            name: name.to_string(),
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }
        jobs.insert(
            name.to_string(),
            Arc::new(Registration {
                name: name.to_string(),
                expression: expression.to_string(),
                schedule,
                job,
            }),
        );
        Ok(())
    }

    /// Start a timer for every registered job that does not have one.
    pub async fn start(&self) {
        self.shutdown_tx.send_replace(false);
        let jobs = self.jobs.read().await;
        let mut timers = self.timers.lock().await;
        info!("Starting job scheduler with {} jobs", jobs.len());

        for (name, registration) in jobs.iter() {
            if timers.get(name).is_some_and(|t| !t.handle.is_finished()) {
                continue;
            }
            let (stop_tx, stop_rx) = watch::channel(false);
            let handle = tokio::spawn(run_timer(
                Arc::clone(registration),
                self.timezone,
                self.sink.clone(),
                stop_rx,
                self.shutdown_rx.clone(),
            ));
            timers.insert(name.clone(), Timer { stop_tx, handle });
        }
    }

    /// Run a job now, outside its timer. Failures are audited like timer
    /// runs and returned to the caller.
    pub async fn trigger(&self, name: &str) -> Result<JobOutput, SchedulerError> {
        let registration = self
            .jobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
        execute(&registration, &self.sink, "manual").await
    }

    pub async fn status(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.read().await;
        let timers = self.timers.lock().await;
        jobs.values()
            .map(|r| JobStatus {
                name: r.name.clone(),
                expression: r.expression.clone(),
                running: timers.get(&r.name).is_some_and(|t| !t.handle.is_finished()),
                next_run: r
                    .schedule
                    .upcoming(self.timezone)
                    .next()
                    .map(|at| at.with_timezone(&Utc)),
            })
            .collect()
    }

    /// Stop one job's timer and wait for it to exit. A run in progress is
    /// allowed to finish.
    pub async fn stop_job(&self, name: &str) -> Result<(), SchedulerError> {
        if !self.jobs.read().await.contains_key(name) {
            return Err(SchedulerError::UnknownJob(name.to_string()));
        }
        let timer = self.timers.lock().await.remove(name);
        if let Some(timer) = timer {
            let _ = timer.stop_tx.send(true);
            if let Err(e) = timer.handle.await {
                warn!(job = %name, "Job timer panicked: {}", e);
            }
            info!(job = %name, "Job stopped");
        }
        Ok(())
    }

    /// Signal every timer to stop. Returns immediately.
    pub fn stop_all(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all timers to exit, up to `timeout`.
    pub async fn wait_for_shutdown(&self, timeout: Duration) {
        info!("Waiting for jobs to complete (timeout: {:?})", timeout);
        let timers: Vec<(String, Timer)> = self.timers.lock().await.drain().collect();

        let shutdown_future = async {
            for (name, timer) in timers {
                if let Err(e) = timer.handle.await {
                    warn!(job = %name, "Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

async fn run_timer(
    registration: Arc<Registration>,
    timezone: Tz,
    sink: AlertSink,
    mut stop_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let name = registration.name.as_str();
    info!(job = name, expression = %registration.expression, "Job scheduled");
    let mut last_fire: Option<DateTime<Tz>> = None;

    loop {
        if *shutdown_rx.borrow() || *stop_rx.borrow() {
            break;
        }

        let now = Utc::now().with_timezone(&timezone);
        let from = match last_fire {
            Some(last) if last > now => last,
            _ => now,
        };
        let Some(next) = registration.schedule.after(&from).next() else {
            warn!(job = name, "Schedule has no future fire times");
            break;
        };
        let wait = (next.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                last_fire = Some(next);
                // Errors are already logged and audited.
                let _ = execute(&registration, &sink, "timer").await;
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!(job = name, "Job shutting down");
}

async fn execute(
    registration: &Registration,
    sink: &AlertSink,
    origin: &'static str,
) -> Result<JobOutput, SchedulerError> {
    let name = registration.name.as_str();
    let start = Instant::now();
    info!(job = name, origin, "Job starting");

    let job = Arc::clone(&registration.job);
    let result = match tokio::spawn(async move { job.execute().await }).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join_error) => Err(format!("job task aborted: {}", join_error)),
    };

    let elapsed = start.elapsed();
    metrics::histogram!("ops_job_duration_seconds", "job" => name.to_string())
        .record(elapsed.as_secs_f64());

    match result {
        Ok(output) => {
            metrics::counter!("ops_job_runs_total", "job" => name.to_string(), "outcome" => "success")
                .increment(1);
            info!(
                job = name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job completed successfully"
            );
            Ok(output)
        }
        Err(message) => {
            metrics::counter!("ops_job_runs_total", "job" => name.to_string(), "outcome" => "failure")
                .increment(1);
            error!(
                job = name,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %message,
                "Job failed"
            );
            sink.log_failure(
                registration.job.module(),
                registration.job.failure_trigger(),
                registration.job.failure_action(),
                &message,
            )
            .await;
            Err(SchedulerError::JobFailed {
                name: name.to_string(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::StoreError;
    use persistence::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestJob {
        run_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Job for TestJob {
        fn module(&self) -> &'static str {
            "TestModule"
        }

        async fn execute(&self) -> Result<JobOutput, MonitorError> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(StoreError::Database("Test failure".into()).into())
            } else {
                Ok(serde_json::json!({ "ok": true }))
            }
        }
    }

    struct PanickingJob;

    #[async_trait::async_trait]
    impl Job for PanickingJob {
        fn module(&self) -> &'static str {
            "TestModule"
        }

        async fn execute(&self) -> Result<JobOutput, MonitorError> {
            panic!("boom");
        }
    }

    fn scheduler() -> (Arc<InMemoryStore>, JobScheduler) {
        let store = Arc::new(InMemoryStore::new());
        let sink = AlertSink::new(store.clone());
        (store, JobScheduler::new(chrono_tz::Asia::Kathmandu, sink))
    }

    fn job(should_fail: bool) -> (Arc<AtomicUsize>, Arc<dyn Job>) {
        let run_count = Arc::new(AtomicUsize::new(0));
        let job = TestJob {
            run_count: Arc::clone(&run_count),
            should_fail,
        };
        (run_count, Arc::new(job))
    }

    #[test]
    fn test_parse_five_field_expression() {
        assert!(parse_expression("*/5 * * * *").is_ok());
        assert!(parse_expression("0 6 * * Sun").is_ok());
        assert!(parse_expression("0 21 * * Fri").is_ok());
    }

    #[test]
    fn test_parse_six_field_expression() {
        assert!(parse_expression("*/10 * * * * *").is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_expression("every tuesday").is_err());
        assert!(parse_expression("").is_err());
    }

    #[tokio::test]
    async fn test_invalid_schedule_rejected() {
        let (_, scheduler) = scheduler();
        let (_, j) = job(false);
        let result = scheduler.schedule("bad", "61 * * * *", j).await;
        assert!(matches!(result, Err(SchedulerError::InvalidSchedule { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_job_rejected() {
        let (_, scheduler) = scheduler();
        let (_, first) = job(false);
        let (_, second) = job(false);
        scheduler.schedule("dup", "0 1 * * *", first).await.unwrap();
        let result = scheduler.schedule("dup", "0 2 * * *", second).await;
        assert!(matches!(result, Err(SchedulerError::DuplicateJob(_))));
    }

    #[tokio::test]
    async fn test_trigger_unknown_job() {
        let (_, scheduler) = scheduler();
        let result = scheduler.trigger("missing").await;
        assert!(matches!(result, Err(SchedulerError::UnknownJob(_))));
    }

    #[tokio::test]
    async fn test_trigger_runs_immediately() {
        let (store, scheduler) = scheduler();
        let (count, j) = job(false);
        scheduler.schedule("weekly", "0 21 * * Fri", j).await.unwrap();

        let output = scheduler.trigger("weekly").await.unwrap();

        assert_eq!(output["ok"], true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(store.actions().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_trigger_is_audited_and_returned() {
        let (store, scheduler) = scheduler();
        let (_, j) = job(true);
        scheduler.schedule("failing", "0 1 * * *", j).await.unwrap();

        let result = scheduler.trigger("failing").await;

        assert!(matches!(result, Err(SchedulerError::JobFailed { .. })));
        let actions = store.actions().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].module, "TestModule");
        assert!(!actions[0].success);
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let (store, scheduler) = scheduler();
        scheduler
            .schedule("panics", "0 1 * * *", Arc::new(PanickingJob))
            .await
            .unwrap();

        let result = scheduler.trigger("panics").await;

        assert!(matches!(result, Err(SchedulerError::JobFailed { .. })));
        assert_eq!(store.actions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_timer_fires_and_survives_failures() {
        let (store, scheduler) = scheduler();
        let (count, j) = job(true);
        scheduler.schedule("every-second", "* * * * * *", j).await.unwrap();
        scheduler.start().await;

        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop_all();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;

        let runs = count.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least two runs, got {}", runs);
        assert_eq!(store.actions().await.len(), runs);
    }

    #[tokio::test]
    async fn test_status_and_stop_job() {
        let (_, scheduler) = scheduler();
        let (_, a) = job(false);
        let (_, b) = job(false);
        scheduler.schedule("a", "0 1 * * *", a).await.unwrap();
        scheduler.schedule("b", "0 2 * * *", b).await.unwrap();
        scheduler.start().await;

        let status = scheduler.status().await;
        assert_eq!(status.len(), 2);
        assert!(status.iter().all(|s| s.running && s.next_run.is_some()));

        scheduler.stop_job("a").await.unwrap();
        let status = scheduler.status().await;
        let a = status.iter().find(|s| s.name == "a").unwrap();
        let b = status.iter().find(|s| s.name == "b").unwrap();
        assert!(!a.running);
        assert!(b.running);

        assert!(matches!(
            scheduler.stop_job("nope").await,
            Err(SchedulerError::UnknownJob(_))
        ));
        scheduler.stop_all();
        scheduler.wait_for_shutdown(Duration::from_secs(1)).await;
    }
}
