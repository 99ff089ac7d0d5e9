//! Scheduled jobs.

pub mod claim_cleanup;
pub mod monitor_jobs;
pub mod scheduler;

pub use claim_cleanup::ClaimCleanupJob;
pub use monitor_jobs::{MonitorJob, MonitorTask};
pub use scheduler::{Job, JobOutput, JobScheduler, JobStatus, SchedulerError};
