//! Dedup claim cleanup background job.
//!
//! Alert, flag and re-engagement dedup windows leave one claim row each.
//! Expired rows serve no purpose, so they are deleted once a day.

use std::sync::Arc;

use persistence::PgMarketplaceStore;
use tracing::info;

use super::scheduler::{Job, JobOutput};
use crate::monitors::MonitorResult;

pub const JOB_NAME: &str = "dedup-claim-cleanup";

/// Default cron expression: daily at 00:30 in the engine timezone.
pub const DEFAULT_EXPRESSION: &str = "30 0 * * *";

/// Background job that purges expired dedup claims.
pub struct ClaimCleanupJob {
    store: Arc<PgMarketplaceStore>,
}

impl ClaimCleanupJob {
    pub fn new(store: Arc<PgMarketplaceStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Job for ClaimCleanupJob {
    fn module(&self) -> &'static str {
        "Housekeeping"
    }

    fn failure_trigger(&self) -> &'static str {
        "Dedup claim cleanup"
    }

    fn failure_action(&self) -> &'static str {
        "Failed to purge expired dedup claims"
    }

    async fn execute(&self) -> MonitorResult<JobOutput> {
        let deleted = self.store.purge_expired_claims().await?;
        info!(deleted = deleted, "Purged expired dedup claims");
        Ok(serde_json::json!({ "deleted": deleted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::scheduler::parse_expression;

    #[test]
    fn test_default_expression_parses() {
        assert!(parse_expression(DEFAULT_EXPRESSION).is_ok());
    }

    #[test]
    fn test_job_name_does_not_clash_with_monitor_jobs() {
        assert!(crate::jobs::MonitorTask::from_name(JOB_NAME).is_none());
    }
}
