//! Reporting monitor: the weekly marketplace report and the daily health
//! check.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use domain::models::{
    AlertSummary, BookingSummary, NewAutomatedAction, NewSystemAlert, NewWeeklyReport,
    ReviewSummary,
};
use domain::services::analytics::{
    growth_percentage, health_score, round2, week_boundary, HealthInputs, WeekBoundary,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{MonitorDeps, MonitorResult};

pub const MODULE: &str = "EmpireWatchdog";

/// Weeks per month used for revenue projection.
const WEEKS_PER_MONTH: f64 = 4.33;

const MAX_DAILY_BOOKINGS: i64 = 1000;
const MAX_DAILY_SIGNUPS: i64 = 10_000;
const MAX_DAILY_FAILED_ACTIONS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ReportOutcome {
    Created { week_ending: NaiveDate, report_id: Uuid },
    AlreadyExists { week_ending: NaiveDate },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub period: Period,
    pub bookings: BookingFigures,
    pub revenue: RevenueFigures,
    pub users: UserFigures,
    pub providers: ProviderFigures,
    pub quality: QualityFigures,
    pub system: SystemFigures,
    pub trends: Trends,
    pub alerts: AlertFigures,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub week_number: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFigures {
    pub total: i64,
    pub completed: i64,
    pub completion_rate: f64,
    pub by_city: BTreeMap<String, i64>,
    pub by_category: BTreeMap<String, i64>,
    pub trend: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueFigures {
    pub total: i64,
    pub average_booking_value: f64,
    pub trend: f64,
    pub projected_monthly: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFigures {
    pub new_signups: i64,
    pub total_active: i64,
    pub referral_signups: i64,
    pub trend: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFigures {
    pub new_signups: i64,
    pub total_active: i64,
    pub verified: i64,
    pub verification_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityFigures {
    pub average_rating: Option<f64>,
    pub total_reviews: i64,
    /// Keys "1" through "5".
    pub rating_distribution: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFigures {
    pub alerts_generated: i64,
    pub automated_actions: i64,
    pub successful_actions: i64,
    pub security_flags: i64,
    pub alerts_by_level: BTreeMap<&'static str, i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub bookings: f64,
    pub users: f64,
    pub revenue: f64,
    pub overall_health: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFigures {
    pub critical: i64,
    pub warnings: i64,
    pub info: i64,
    pub unresolved: i64,
}

/// Outcome of one component check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub component: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealthReport {
    pub checks: Vec<HealthCheck>,
}

impl SystemHealthReport {
    pub fn issues(&self) -> impl Iterator<Item = &HealthCheck> {
        self.checks.iter().filter(|c| !c.healthy)
    }

    pub fn is_healthy(&self) -> bool {
        self.issues().next().is_none()
    }
}

pub struct ReportingMonitor {
    deps: MonitorDeps,
    timezone: Tz,
}

impl ReportingMonitor {
    pub fn new(deps: MonitorDeps, timezone: Tz) -> Self {
        Self { deps, timezone }
    }

    /// Stores the report for the current week unless it already exists.
    pub async fn generate_weekly_report(&self) -> MonitorResult<ReportOutcome> {
        let week = week_boundary(Utc::now(), self.timezone);

        if self
            .deps
            .store
            .find_weekly_report(week.week_ending)
            .await?
            .is_some()
        {
            info!(week_ending = %week.week_ending, "Weekly report already exists");
            return Ok(ReportOutcome::AlreadyExists {
                week_ending: week.week_ending,
            });
        }

        let summary = self.gather_weekly_summary(&week).await?;
        let summary_json = serde_json::to_value(&summary)?;

        let Some(report) = self
            .deps
            .store
            .insert_weekly_report(NewWeeklyReport {
                week_ending: week.week_ending,
                summary: summary_json,
            })
            .await?
        else {
            info!(week_ending = %week.week_ending, "Weekly report stored concurrently");
            return Ok(ReportOutcome::AlreadyExists {
                week_ending: week.week_ending,
            });
        };

        let key_metrics = json!({
            "totalBookings": summary.bookings.total,
            "totalRevenue": summary.revenue.total,
            "newUsers": summary.users.new_signups,
            "newProviders": summary.providers.new_signups,
            "alertsGenerated": summary.system.alerts_generated,
        });

        self.deps
            .sink
            .create_system_alert(NewSystemAlert::info(
                "Weekly Empire Report Generated",
                format!(
                    "Week ending {}: {} bookings, {} revenue, {} new users",
                    week.week_ending.format("%a %b %d %Y"),
                    summary.bookings.total,
                    summary.revenue.total,
                    summary.users.new_signups
                ),
                json!({
                    "weekEnding": week.week_ending,
                    "reportId": report.id,
                    "keyMetrics": key_metrics,
                    "trends": summary.trends,
                    "alerts": summary.alerts,
                }),
            ))
            .await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Weekly Summary Generation",
                format!("Generated weekly report for week ending {}", week.week_ending),
                json!({
                    "weekEnding": week.week_ending,
                    "reportId": report.id,
                    "keyHighlights": key_metrics,
                    "healthScore": summary.trends.overall_health,
                }),
            ))
            .await;

        info!(week_ending = %week.week_ending, report_id = %report.id, "Weekly report generated");
        Ok(ReportOutcome::Created {
            week_ending: week.week_ending,
            report_id: report.id,
        })
    }

    async fn gather_weekly_summary(&self, week: &WeekBoundary) -> MonitorResult<WeeklySummary> {
        let store = &self.deps.store;
        let previous = week.previous();

        let bookings = store.booking_summary(week.start, week.end).await?;
        let previous_bookings = store.booking_summary(previous.start, previous.end).await?;
        let users = store.user_summary(week.start, week.end).await?;
        let previous_users = store.user_summary(previous.start, previous.end).await?;
        let providers = store.provider_summary(week.start, week.end).await?;
        let reviews = store.review_summary(week.start, week.end).await?;
        let alerts = store.alert_summary(week.start, week.end).await?;
        let actions = store.action_summary(week.start, week.end).await?;
        let flags = store.count_security_flags(week.start, week.end).await?;

        let booking_trend = growth_percentage(previous_bookings.total, bookings.total);
        let user_trend = growth_percentage(previous_users.new_users, users.new_users);
        let revenue_trend = growth_percentage(previous_bookings.revenue, bookings.revenue);
        let overall_health = health_score(&HealthInputs {
            booking_growth: booking_trend,
            user_growth: user_trend,
            revenue_growth: revenue_trend,
            average_rating: reviews.average_rating,
            security_flags: flags,
        });

        let insights = weekly_insights(&InsightInputs {
            booking_trend,
            user_trend,
            new_users: users.new_users,
            critical_alerts: alerts.critical,
            average_rating: reviews.average_rating,
        });

        let week_end_local = week.end.with_timezone(&self.timezone);
        Ok(WeeklySummary {
            period: Period {
                week_start: week.start,
                week_end: week.end,
                week_number: week_end_local.iso_week().week(),
                year: week_end_local.year(),
            },
            bookings: booking_figures(&bookings, booking_trend),
            revenue: RevenueFigures {
                total: bookings.revenue,
                average_booking_value: round2(bookings.average_order_value()),
                trend: revenue_trend,
                projected_monthly: round2(bookings.revenue as f64 * WEEKS_PER_MONTH),
            },
            users: UserFigures {
                new_signups: users.new_users,
                total_active: users.active_users,
                referral_signups: users.referral_signups,
                trend: user_trend,
            },
            providers: ProviderFigures {
                new_signups: providers.new_providers,
                total_active: providers.active_providers,
                verified: providers.verified_providers,
                verification_rate: round2(rate(providers.verified_providers, providers.new_providers)),
            },
            quality: quality_figures(&reviews),
            system: SystemFigures {
                alerts_generated: alerts.total(),
                automated_actions: actions.total,
                successful_actions: actions.successful,
                security_flags: flags,
                alerts_by_level: alerts_by_level(&alerts),
            },
            trends: Trends {
                bookings: booking_trend,
                users: user_trend,
                revenue: revenue_trend,
                overall_health,
            },
            alerts: AlertFigures {
                critical: alerts.critical,
                warnings: alerts.warning,
                info: alerts.info,
                unresolved: alerts.unread,
            },
            insights,
        })
    }

    /// Daily sanity check over the trailing 24 hours.
    pub async fn monitor_system_health(&self) -> MonitorResult<SystemHealthReport> {
        let now = Utc::now();
        let since = now - Duration::hours(24);
        let store = &self.deps.store;

        let bookings = store.booking_summary(since, now).await?.total;
        let signups = store.user_summary(since, now).await?.new_users;
        let available = store.count_available_providers().await?;
        let failed_actions = store.action_summary(since, now).await?.failed;

        let report = SystemHealthReport {
            checks: vec![
                check(
                    "bookings",
                    bookings > 0 && bookings < MAX_DAILY_BOOKINGS,
                    if bookings == 0 {
                        "No bookings in the last 24 hours"
                    } else {
                        "Unusually high booking volume"
                    },
                    json!({ "bookingsLast24h": bookings }),
                ),
                check(
                    "users",
                    signups < MAX_DAILY_SIGNUPS,
                    "Abnormal signup volume",
                    json!({ "signupsLast24h": signups }),
                ),
                check(
                    "providers",
                    available >= 1,
                    "No providers available",
                    json!({ "availableProviders": available }),
                ),
                check(
                    "automation",
                    failed_actions < MAX_DAILY_FAILED_ACTIONS,
                    "High automation failure rate",
                    json!({ "failedActionsLast24h": failed_actions }),
                ),
            ],
        };

        let issues: Vec<&HealthCheck> = report.issues().collect();
        if !issues.is_empty() {
            self.deps
                .sink
                .create_system_alert(NewSystemAlert::warning(
                    "System Health Issues Detected",
                    format!("{} health issues detected in daily system check", issues.len()),
                    json!({ "issues": issues, "checkTime": now }),
                ))
                .await;
        }

        let components: Vec<&str> = report.checks.iter().map(|c| c.component).collect();
        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Daily system health check",
                format!("Completed health check, found {} issues", issues.len()),
                json!({ "issueComponents": issues.len(), "components": components }),
            ))
            .await;

        info!(issues = issues.len(), "System health check finished");
        Ok(report)
    }
}

fn check(
    component: &'static str,
    healthy: bool,
    issue: &str,
    details: serde_json::Value,
) -> HealthCheck {
    HealthCheck {
        component,
        healthy,
        issue: (!healthy).then(|| issue.to_string()),
        details,
    }
}

fn rate(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn booking_figures(bookings: &BookingSummary, trend: f64) -> BookingFigures {
    BookingFigures {
        total: bookings.total,
        completed: bookings.completed,
        completion_rate: round2(bookings.completion_rate()),
        by_city: bookings.by_city.clone(),
        by_category: bookings.by_category.clone(),
        trend,
    }
}

fn quality_figures(reviews: &ReviewSummary) -> QualityFigures {
    QualityFigures {
        average_rating: reviews.average_rating.map(round2),
        total_reviews: reviews.count,
        rating_distribution: reviews
            .distribution
            .iter()
            .enumerate()
            .map(|(i, count)| ((i + 1).to_string(), *count))
            .collect(),
    }
}

fn alerts_by_level(alerts: &AlertSummary) -> BTreeMap<&'static str, i64> {
    BTreeMap::from([
        ("INFO", alerts.info),
        ("WARNING", alerts.warning),
        ("CRITICAL", alerts.critical),
    ])
}

struct InsightInputs {
    booking_trend: f64,
    user_trend: f64,
    new_users: i64,
    critical_alerts: i64,
    average_rating: Option<f64>,
}

fn weekly_insights(inputs: &InsightInputs) -> Vec<String> {
    let mut insights = Vec::new();

    if inputs.booking_trend > 20.0 {
        insights.push(format!(
            "Exceptional booking growth of {}% - consider scaling provider capacity",
            inputs.booking_trend
        ));
    } else if inputs.booking_trend < -10.0 {
        insights.push(format!(
            "Declining bookings ({}%) - investigate market factors or launch promotion",
            inputs.booking_trend
        ));
    }

    if inputs.new_users > 0 && inputs.user_trend > 30.0 {
        insights.push(format!(
            "Strong user acquisition momentum with {}% growth",
            inputs.user_trend
        ));
    }

    if inputs.critical_alerts > 0 {
        insights.push("Critical system alerts require immediate attention".to_string());
    }

    match inputs.average_rating {
        Some(rating) if rating < 3.5 => {
            insights.push("Service quality concerns - average rating below 3.5 stars".to_string())
        }
        Some(rating) if rating > 4.5 => insights.push(
            "Excellent service quality maintained - leveraging for marketing".to_string(),
        ),
        _ => {}
    }

    insights
}
