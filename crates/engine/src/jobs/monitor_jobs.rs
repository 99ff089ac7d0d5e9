//! The default table of scheduled monitor runs.

use std::collections::HashMap;
use std::sync::Arc;

use super::scheduler::{Job, JobOutput};
use crate::monitors::{flow, growth, reporting, scout, security, MonitorResult, Monitors};

/// A monitor operation that runs on a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorTask {
    DelayedBookings,
    CityActivityAnalysis,
    InactiveUserReengagement,
    SuspiciousPatternDetection,
    SecurityFlagReview,
    RegionCapacityAnalysis,
    ServiceOpportunityAnalysis,
    ProviderOnboardingAnalysis,
    UnderperformingProviderAnalysis,
    WeeklyReportGeneration,
    SystemHealthMonitoring,
}

impl MonitorTask {
    pub const ALL: [MonitorTask; 11] = [
        MonitorTask::DelayedBookings,
        MonitorTask::CityActivityAnalysis,
        MonitorTask::InactiveUserReengagement,
        MonitorTask::SuspiciousPatternDetection,
        MonitorTask::SecurityFlagReview,
        MonitorTask::RegionCapacityAnalysis,
        MonitorTask::ServiceOpportunityAnalysis,
        MonitorTask::ProviderOnboardingAnalysis,
        MonitorTask::UnderperformingProviderAnalysis,
        MonitorTask::WeeklyReportGeneration,
        MonitorTask::SystemHealthMonitoring,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MonitorTask::DelayedBookings => "delayed-bookings",
            MonitorTask::CityActivityAnalysis => "city-activity-analysis",
            MonitorTask::InactiveUserReengagement => "inactive-user-reengagement",
            MonitorTask::SuspiciousPatternDetection => "suspicious-pattern-detection",
            MonitorTask::SecurityFlagReview => "security-flag-review",
            MonitorTask::RegionCapacityAnalysis => "region-capacity-analysis",
            MonitorTask::ServiceOpportunityAnalysis => "service-opportunity-analysis",
            MonitorTask::ProviderOnboardingAnalysis => "provider-onboarding-analysis",
            MonitorTask::UnderperformingProviderAnalysis => "underperforming-provider-analysis",
            MonitorTask::WeeklyReportGeneration => "weekly-report-generation",
            MonitorTask::SystemHealthMonitoring => "system-health-monitoring",
        }
    }

    /// Default 5-field cron expression, in the engine timezone.
    pub fn default_expression(self) -> &'static str {
        match self {
            MonitorTask::DelayedBookings => "*/5 * * * *",
            MonitorTask::CityActivityAnalysis => "0 2 * * *",
            MonitorTask::InactiveUserReengagement => "0 10 * * *",
            MonitorTask::SuspiciousPatternDetection => "0 3 * * *",
            MonitorTask::SecurityFlagReview => "0 4 * * *",
            MonitorTask::RegionCapacityAnalysis => "0 1 * * *",
            MonitorTask::ServiceOpportunityAnalysis => "0 6 * * Sun",
            MonitorTask::ProviderOnboardingAnalysis => "0 8 * * Mon",
            MonitorTask::UnderperformingProviderAnalysis => "0 9 * * Tue",
            MonitorTask::WeeklyReportGeneration => "0 21 * * Fri",
            MonitorTask::SystemHealthMonitoring => "0 5 * * *",
        }
    }

    pub fn module(self) -> &'static str {
        match self {
            MonitorTask::DelayedBookings => flow::MODULE,
            MonitorTask::CityActivityAnalysis | MonitorTask::InactiveUserReengagement => {
                growth::MODULE
            }
            MonitorTask::SuspiciousPatternDetection | MonitorTask::SecurityFlagReview => {
                security::MODULE
            }
            MonitorTask::RegionCapacityAnalysis
            | MonitorTask::ServiceOpportunityAnalysis
            | MonitorTask::ProviderOnboardingAnalysis
            | MonitorTask::UnderperformingProviderAnalysis => scout::MODULE,
            MonitorTask::WeeklyReportGeneration | MonitorTask::SystemHealthMonitoring => {
                reporting::MODULE
            }
        }
    }

    fn failure_text(self) -> (&'static str, &'static str) {
        match self {
            MonitorTask::DelayedBookings => {
                ("Delayed booking check", "Failed to handle delayed bookings")
            }
            MonitorTask::CityActivityAnalysis => {
                ("City activity analysis", "Failed to analyze city activity")
            }
            MonitorTask::InactiveUserReengagement => {
                ("Inactive user re-engagement", "Failed to re-engage inactive users")
            }
            MonitorTask::SuspiciousPatternDetection => (
                "Suspicious pattern detection",
                "Failed to detect suspicious patterns",
            ),
            MonitorTask::SecurityFlagReview => {
                ("Security flag review", "Failed to review security flags")
            }
            MonitorTask::RegionCapacityAnalysis => {
                ("Region capacity analysis", "Failed to analyze region capacity")
            }
            MonitorTask::ServiceOpportunityAnalysis => (
                "Service opportunity analysis",
                "Failed to identify service opportunities",
            ),
            MonitorTask::ProviderOnboardingAnalysis => (
                "Provider onboarding analysis",
                "Failed to analyze onboarding trends",
            ),
            MonitorTask::UnderperformingProviderAnalysis => (
                "Underperforming provider analysis",
                "Failed to identify underperformers",
            ),
            MonitorTask::WeeklyReportGeneration => {
                ("Weekly report generation", "Failed to generate weekly report")
            }
            MonitorTask::SystemHealthMonitoring => {
                ("System health monitoring", "Failed to monitor system health")
            }
        }
    }

    /// Looks a task up by name. Underscores stand in for dashes, since
    /// environment variable keys cannot carry dashes.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.replace('_', "-");
        Self::ALL.into_iter().find(|task| task.name() == name)
    }

    /// Expression to schedule with, honoring per-name overrides.
    pub fn expression<'a>(self, overrides: &'a HashMap<String, String>) -> &'a str {
        overrides
            .get(self.name())
            .or_else(|| overrides.get(&self.name().replace('-', "_")))
            .map(String::as_str)
            .unwrap_or_else(|| self.default_expression())
    }
}

fn summarize<T: serde::Serialize>(result: MonitorResult<T>) -> MonitorResult<JobOutput> {
    Ok(serde_json::to_value(result?)?)
}

/// Runs one [`MonitorTask`] against the shared monitors.
pub struct MonitorJob {
    task: MonitorTask,
    monitors: Arc<Monitors>,
}

impl MonitorJob {
    pub fn new(task: MonitorTask, monitors: Arc<Monitors>) -> Self {
        Self { task, monitors }
    }
}

#[async_trait::async_trait]
impl Job for MonitorJob {
    fn module(&self) -> &'static str {
        self.task.module()
    }

    fn failure_trigger(&self) -> &'static str {
        self.task.failure_text().0
    }

    fn failure_action(&self) -> &'static str {
        self.task.failure_text().1
    }

    async fn execute(&self) -> MonitorResult<JobOutput> {
        let m = &self.monitors;
        match self.task {
            MonitorTask::DelayedBookings => summarize(m.flow.handle_delayed_bookings().await),
            MonitorTask::CityActivityAnalysis => summarize(m.growth.analyze_city_activity().await),
            MonitorTask::InactiveUserReengagement => {
                summarize(m.growth.reengage_inactive_users().await)
            }
            MonitorTask::SuspiciousPatternDetection => {
                summarize(m.security.detect_suspicious_patterns().await)
            }
            MonitorTask::SecurityFlagReview => summarize(
                m.security
                    .auto_review_flags()
                    .await
                    .map(|reviewed| serde_json::json!({ "reviewed": reviewed })),
            ),
            MonitorTask::RegionCapacityAnalysis => {
                summarize(m.scout.analyze_region_capacity().await)
            }
            MonitorTask::ServiceOpportunityAnalysis => {
                summarize(m.scout.identify_service_opportunities().await)
            }
            MonitorTask::ProviderOnboardingAnalysis => {
                summarize(m.scout.analyze_onboarding_trends().await)
            }
            MonitorTask::UnderperformingProviderAnalysis => {
                summarize(m.scout.identify_underperformers().await)
            }
            MonitorTask::WeeklyReportGeneration => {
                summarize(m.reporting.generate_weekly_report().await)
            }
            MonitorTask::SystemHealthMonitoring => {
                summarize(m.reporting.monitor_system_health().await)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::scheduler::parse_expression;
    use std::collections::HashSet;

    #[test]
    fn test_unserializable_output_is_an_error() {
        // JSON objects need string keys.
        let mut output = HashMap::new();
        output.insert((1, 2), "pair");

        let result = summarize(Ok(output));

        assert!(matches!(result, Err(crate::monitors::MonitorError::Serialization(_))));
    }

    #[test]
    fn test_every_default_expression_parses() {
        for task in MonitorTask::ALL {
            assert!(
                parse_expression(task.default_expression()).is_ok(),
                "{} has an invalid default expression",
                task.name()
            );
        }
    }

    #[test]
    fn test_names_are_unique_and_resolvable() {
        let names: HashSet<_> = MonitorTask::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), MonitorTask::ALL.len());
        for task in MonitorTask::ALL {
            assert_eq!(MonitorTask::from_name(task.name()), Some(task));
        }
        assert_eq!(
            MonitorTask::from_name("weekly_report_generation"),
            Some(MonitorTask::WeeklyReportGeneration)
        );
        assert_eq!(MonitorTask::from_name("nope"), None);
    }

    #[test]
    fn test_override_replaces_default() {
        let mut overrides = HashMap::new();
        overrides.insert("delayed-bookings".to_string(), "*/1 * * * *".to_string());
        overrides.insert("security_flag_review".to_string(), "0 7 * * *".to_string());

        assert_eq!(
            MonitorTask::DelayedBookings.expression(&overrides),
            "*/1 * * * *"
        );
        assert_eq!(
            MonitorTask::WeeklyReportGeneration.expression(&overrides),
            "0 21 * * Fri"
        );
        assert_eq!(MonitorTask::SecurityFlagReview.expression(&overrides), "0 7 * * *");
    }

    #[test]
    fn test_modules() {
        assert_eq!(MonitorTask::DelayedBookings.module(), "ServiceFlow");
        assert_eq!(MonitorTask::SecurityFlagReview.module(), "SecurityShield");
        assert_eq!(MonitorTask::ServiceOpportunityAnalysis.module(), "ProviderScout");
        assert_eq!(MonitorTask::InactiveUserReengagement.module(), "SmartReferrals");
        assert_eq!(MonitorTask::SystemHealthMonitoring.module(), "EmpireWatchdog");
    }
}
