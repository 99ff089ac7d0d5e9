//! Provider scout: supply versus demand, unmet searches, recruitment and
//! provider quality.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use domain::models::{NewAutomatedAction, NewSystemAlert, ServiceRequestLog};
use domain::services::analytics::{round2, utilization_percent};
use serde::Serialize;
use serde_json::json;
use shared::validation::normalize_search_term;
use tracing::info;
use uuid::Uuid;

use super::{MonitorDeps, MonitorError, MonitorResult};

pub const MODULE: &str = "ProviderScout";

/// Trailing window over which demand is averaged.
pub const CAPACITY_WINDOW_DAYS: i64 = 3;

/// Bookings one provider is expected to handle per day.
pub const BOOKINGS_PER_PROVIDER_PER_DAY: f64 = 3.0;

/// Utilization above this percentage is reported as strain.
pub const STRAIN_THRESHOLD_PERCENT: f64 = 80.0;

/// Searches a term needs within the window to count as an opportunity.
pub const MIN_OPPORTUNITY_SEARCHES: i64 = 3;

/// Opportunities reported per city.
pub const OPPORTUNITIES_PER_CITY: usize = 3;

const STRAIN_ALERT_WINDOW_HOURS: i64 = 24;
const OPPORTUNITY_WINDOW_DAYS: i64 = 7;
const TOP_RECRUITMENT_ZONES: usize = 5;
const REVIEW_WINDOW_DAYS: i64 = 30;
const LOW_PUNCTUALITY_PERCENT: f64 = 70.0;
const LOW_COMPLETION_PERCENT: f64 = 80.0;
const LOW_ACTIVITY_BOOKINGS: i64 = 3;
const SLOW_RECRUITMENT_SIGNUPS: i64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacitySummary {
    pub areas_analyzed: usize,
    pub strain_alerts: usize,
    pub zero_coverage_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub service: String,
    pub request_count: i64,
    pub last_requested: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingReport {
    pub weekly_signups: i64,
    pub monthly_signups: i64,
    pub weekly_verification_rate: f64,
    pub monthly_verification_rate: f64,
    pub activation_rate: f64,
    pub verification_trend: &'static str,
    pub recruitment_recommendation: &'static str,
}

/// Performance issue found for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderIssue {
    NoActivity,
    LowActivity,
    LowPunctuality,
    LowCompletionRate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Underperformer {
    pub provider_id: Uuid,
    pub name: String,
    pub issues: Vec<ProviderIssue>,
    pub monthly_bookings: i64,
    pub on_time_pct: f64,
    pub completion_pct: f64,
}

pub struct ScoutMonitor {
    deps: MonitorDeps,
}

impl ScoutMonitor {
    pub fn new(deps: MonitorDeps) -> Self {
        Self { deps }
    }

    /// Compares recent demand with provider supply for every service area.
    pub async fn analyze_region_capacity(&self) -> MonitorResult<CapacitySummary> {
        let since = Utc::now() - Duration::days(CAPACITY_WINDOW_DAYS);
        let areas = self.deps.store.list_service_areas().await?;
        let mut summary = CapacitySummary {
            areas_analyzed: areas.len(),
            ..Default::default()
        };

        for area in areas {
            let bookings = self.deps.store.count_bookings_in_area(&area, since).await?;
            let providers = self.deps.store.count_providers_covering(&area).await?;
            let per_day = bookings as f64 / CAPACITY_WINDOW_DAYS as f64;
            let utilization = utilization_percent(per_day, providers, BOOKINGS_PER_PROVIDER_PER_DAY);

            if utilization > STRAIN_THRESHOLD_PERCENT {
                let alert = self
                    .deps
                    .sink
                    .create_system_alert_once(
                        NewSystemAlert::warning(
                            "Provider Capacity Strain",
                            format!(
                                "{} {} services at {:.1}% capacity utilization",
                                area.city, area.category, utilization
                            ),
                            json!({
                                "city": area.city,
                                "category": area.category,
                                "utilizationRate": round2(utilization),
                                "bookingsPerDay": round2(per_day),
                                "availableProviders": providers,
                                "maxDailyCapacity": providers as f64 * BOOKINGS_PER_PROVIDER_PER_DAY,
                                "recommendedAction": "Launch recruitment campaign",
                                "analysis": {
                                    "totalBookings": bookings,
                                    "analysisWindow": "3 days",
                                    "thresholdExceeded": "80%",
                                },
                            }),
                        ),
                        format!("capacity-strain:{}", area.city),
                        Duration::hours(STRAIN_ALERT_WINDOW_HOURS),
                    )
                    .await;

                if alert.is_some() {
                    self.deps
                        .sink
                        .log_automated_action(NewAutomatedAction::succeeded(
                            MODULE,
                            "Surge of demand in any region",
                            format!("Created capacity strain alert for {} {}", area.city, area.category),
                            json!({
                                "city": area.city,
                                "category": area.category,
                                "utilizationRate": round2(utilization),
                                "bookingsPerDay": round2(per_day),
                                "providersCount": providers,
                            }),
                        ))
                        .await;
                    summary.strain_alerts += 1;
                }
            }

            if providers == 0 && bookings > 0 {
                self.deps
                    .sink
                    .create_system_alert(NewSystemAlert::critical(
                        "Zero Provider Coverage",
                        format!(
                            "No providers available for {} in {} despite {} recent booking requests",
                            area.category, area.city, bookings
                        ),
                        json!({
                            "city": area.city,
                            "category": area.category,
                            "recentBookingRequests": bookings,
                            "urgentAction": "Immediate provider recruitment required",
                        }),
                    ))
                    .await;
                self.deps
                    .sink
                    .log_automated_action(NewAutomatedAction::succeeded(
                        MODULE,
                        "Surge of demand in any region",
                        format!("Reported zero provider coverage for {} {}", area.city, area.category),
                        json!({ "city": area.city, "category": area.category, "recentBookingRequests": bookings }),
                    ))
                    .await;
                summary.zero_coverage_alerts += 1;
            }
        }

        info!(
            areas = summary.areas_analyzed,
            strain_alerts = summary.strain_alerts,
            zero_coverage_alerts = summary.zero_coverage_alerts,
            "Region capacity analysis finished"
        );
        Ok(summary)
    }

    /// Records a search that found no service.
    pub async fn log_unavailable_service_request(
        &self,
        search_term: &str,
        city: &str,
        user_id: Option<Uuid>,
    ) -> MonitorResult<ServiceRequestLog> {
        let term = normalize_search_term(search_term);
        if term.is_empty() {
            return Err(MonitorError::InvalidInput("search term is empty".into()));
        }
        let city = city.trim();
        if city.is_empty() {
            return Err(MonitorError::InvalidInput("city is empty".into()));
        }

        let log = self
            .deps
            .store
            .record_service_request(&term, city, Utc::now())
            .await?;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "User search with no results",
                format!("Logged unavailable service request: {} in {}", term, city),
                json!({
                    "searchTerm": term,
                    "city": city,
                    "userId": user_id,
                    "requestCount": log.count,
                }),
            ))
            .await;

        Ok(log)
    }

    /// Reports the most searched missing services per city. Returns the
    /// opportunities found, keyed by city.
    pub async fn identify_service_opportunities(
        &self,
    ) -> MonitorResult<BTreeMap<String, Vec<Opportunity>>> {
        let since = Utc::now() - Duration::days(OPPORTUNITY_WINDOW_DAYS);
        let requests = self
            .deps
            .store
            .list_service_requests(since, MIN_OPPORTUNITY_SEARCHES)
            .await?;

        let by_city = group_top_requests(requests, OPPORTUNITIES_PER_CITY);

        for (city, opportunities) in &by_city {
            let total_requests: i64 = opportunities.iter().map(|o| o.request_count).sum();

            self.deps
                .sink
                .create_system_alert(NewSystemAlert::info(
                    "New Service Opportunities Identified",
                    format!("{} high-demand services identified in {}", opportunities.len(), city),
                    json!({
                        "city": city,
                        "opportunities": opportunities,
                        "analysisWindow": "7 days",
                        "totalRequests": total_requests,
                        "recommendation": "Consider adding these services or recruiting providers",
                    }),
                ))
                .await;

            self.deps
                .sink
                .log_automated_action(NewAutomatedAction::succeeded(
                    MODULE,
                    "Weekly service opportunity analysis",
                    format!("Identified {} service opportunities in {}", opportunities.len(), city),
                    json!({
                        "city": city,
                        "opportunities": opportunities,
                        "totalRequests": total_requests,
                    }),
                ))
                .await;
        }

        Ok(by_city)
    }

    /// Weekly recruitment report comparing the last 7 and 30 days.
    pub async fn analyze_onboarding_trends(&self) -> MonitorResult<OnboardingReport> {
        let now = Utc::now();
        let weekly = self
            .deps
            .store
            .onboarding_stats(now - Duration::days(7), TOP_RECRUITMENT_ZONES)
            .await?;
        let monthly = self
            .deps
            .store
            .onboarding_stats(now - Duration::days(30), TOP_RECRUITMENT_ZONES)
            .await?;

        let weekly_rate = weekly.verification_rate();
        let monthly_rate = monthly.verification_rate();
        let report = OnboardingReport {
            weekly_signups: weekly.signups,
            monthly_signups: monthly.signups,
            weekly_verification_rate: round2(weekly_rate),
            monthly_verification_rate: round2(monthly_rate),
            activation_rate: round2(weekly.activation_rate()),
            verification_trend: if weekly_rate > monthly_rate {
                "improving"
            } else {
                "declining"
            },
            recruitment_recommendation: if weekly.signups < SLOW_RECRUITMENT_SIGNUPS {
                "increase_recruitment_efforts"
            } else {
                "maintain_current_pace"
            },
        };

        self.deps
            .sink
            .create_system_alert(NewSystemAlert::info(
                "Weekly Provider Onboarding Report",
                format!(
                    "{} new providers onboarded with {:.1}% verification rate",
                    weekly.signups, weekly_rate
                ),
                json!({
                    "weeklySignups": report.weekly_signups,
                    "monthlySignups": report.monthly_signups,
                    "weeklyVerificationRate": report.weekly_verification_rate,
                    "monthlyVerificationRate": report.monthly_verification_rate,
                    "activationRate": report.activation_rate,
                    "topRecruitmentCities": weekly.top_zones,
                    "insights": {
                        "verificationTrend": report.verification_trend,
                        "recruitmentRecommendation": report.recruitment_recommendation,
                    },
                }),
            ))
            .await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Weekly provider trend analysis",
                format!("Analyzed onboarding trends for {} new providers", weekly.signups),
                json!({
                    "weeklySignups": report.weekly_signups,
                    "verificationRate": report.weekly_verification_rate,
                    "activationRate": report.activation_rate,
                }),
            ))
            .await;

        Ok(report)
    }

    /// Finds established providers with activity or quality problems.
    pub async fn identify_underperformers(&self) -> MonitorResult<Vec<Underperformer>> {
        let now = Utc::now();
        let cutoff = now - Duration::days(REVIEW_WINDOW_DAYS);
        let activity = self
            .deps
            .store
            .list_provider_activity(cutoff, cutoff)
            .await?;
        let analyzed = activity.len();

        let underperformers: Vec<Underperformer> = activity
            .into_iter()
            .filter_map(|a| {
                let mut issues = Vec::new();
                if a.provider.on_time_pct < LOW_PUNCTUALITY_PERCENT {
                    issues.push(ProviderIssue::LowPunctuality);
                }
                match a.completion_rate() {
                    None => issues.push(ProviderIssue::NoActivity),
                    Some(rate) => {
                        if rate < LOW_COMPLETION_PERCENT {
                            issues.push(ProviderIssue::LowCompletionRate);
                        }
                        if a.total_bookings < LOW_ACTIVITY_BOOKINGS {
                            issues.push(ProviderIssue::LowActivity);
                        }
                    }
                }
                (!issues.is_empty()).then(|| Underperformer {
                    provider_id: a.provider.id,
                    name: a.provider.name,
                    issues,
                    monthly_bookings: a.total_bookings,
                    on_time_pct: a.provider.on_time_pct,
                    completion_pct: a.provider.completion_pct,
                })
            })
            .collect();

        info!(analyzed, underperformers = underperformers.len(), "Provider performance review finished");
        if underperformers.is_empty() {
            return Ok(underperformers);
        }

        let count = |issue: ProviderIssue| {
            underperformers
                .iter()
                .filter(|u| u.issues.contains(&issue))
                .count()
        };
        let breakdown = json!({
            "noActivity": count(ProviderIssue::NoActivity),
            "lowActivity": count(ProviderIssue::LowActivity),
            "lowPunctuality": count(ProviderIssue::LowPunctuality),
            "lowCompletion": count(ProviderIssue::LowCompletionRate),
        });

        self.deps
            .sink
            .create_system_alert(NewSystemAlert::warning(
                "Underperforming Providers Identified",
                format!(
                    "{} providers need attention for performance issues",
                    underperformers.len()
                ),
                json!({
                    "totalUnderperformers": underperformers.len(),
                    "issueBreakdown": breakdown,
                    "recommendations": {
                        "noActivity": "Consider deactivation or re-engagement campaign",
                        "lowActivity": "Provide additional training or incentives",
                        "lowPunctuality": "Schedule management training",
                        "lowCompletion": "Investigate reasons and provide support",
                    },
                    "providerDetails": underperformers,
                }),
            ))
            .await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Provider performance review",
                format!("Identified {} underperforming providers", underperformers.len()),
                json!({
                    "underperformerCount": underperformers.len(),
                    "issueBreakdown": breakdown,
                }),
            ))
            .await;

        Ok(underperformers)
    }
}

/// Keeps the first `per_city` requests of each city, preserving input order.
fn group_top_requests(
    requests: Vec<ServiceRequestLog>,
    per_city: usize,
) -> BTreeMap<String, Vec<Opportunity>> {
    let mut by_city: BTreeMap<String, Vec<Opportunity>> = BTreeMap::new();
    for request in requests {
        let entry = by_city.entry(request.city).or_default();
        if entry.len() < per_city {
            entry.push(Opportunity {
                service: request.search_term,
                request_count: request.count,
                last_requested: request.last_searched_at,
            });
        }
    }
    by_city
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::MockNotificationPort;
    use persistence::InMemoryStore;
    use std::sync::Arc;

    fn monitor() -> (Arc<InMemoryStore>, ScoutMonitor) {
        let store = Arc::new(InMemoryStore::new());
        let deps = MonitorDeps::new(store.clone(), Arc::new(MockNotificationPort::new()));
        (store, ScoutMonitor::new(deps))
    }

    fn log(term: &str, city: &str, count: i64) -> ServiceRequestLog {
        ServiceRequestLog {
            id: Uuid::new_v4(),
            search_term: term.into(),
            city: city.into(),
            count,
            last_searched_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_group_top_requests_caps_per_city() {
        let grouped = group_top_requests(
            vec![
                log("pest control", "Kathmandu", 9),
                log("pool cleaning", "Pokhara", 8),
                log("tiling", "Kathmandu", 7),
                log("roofing", "Kathmandu", 5),
                log("solar repair", "Kathmandu", 4),
            ],
            3,
        );

        let ktm: Vec<&str> = grouped["Kathmandu"].iter().map(|o| o.service.as_str()).collect();
        assert_eq!(ktm, vec!["pest control", "tiling", "roofing"]);
        assert_eq!(grouped["Pokhara"].len(), 1);
    }

    #[tokio::test]
    async fn test_empty_search_term_rejected() {
        let (store, monitor) = monitor();
        let result = monitor
            .log_unavailable_service_request("   ", "Kathmandu", None)
            .await;
        assert!(matches!(result, Err(MonitorError::InvalidInput(_))));
        assert!(store.service_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_search_terms_are_normalized_and_counted() {
        let (store, monitor) = monitor();
        monitor
            .log_unavailable_service_request("  Pest   Control ", "Kathmandu", None)
            .await
            .unwrap();
        let log = monitor
            .log_unavailable_service_request("pest control", "Kathmandu", Some(Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(log.search_term, "pest control");
        assert_eq!(log.count, 2);
        assert_eq!(store.service_requests().await.len(), 1);
        assert_eq!(
            store.actions().await[0].action_taken,
            "Logged unavailable service request: pest control in Kathmandu"
        );
    }

    #[tokio::test]
    async fn test_opportunities_need_three_searches() {
        let (store, monitor) = monitor();
        for _ in 0..3 {
            monitor
                .log_unavailable_service_request("tiling", "Pokhara", None)
                .await
                .unwrap();
        }
        monitor
            .log_unavailable_service_request("roofing", "Pokhara", None)
            .await
            .unwrap();

        let found = monitor.identify_service_opportunities().await.unwrap();

        assert_eq!(found["Pokhara"].len(), 1);
        assert_eq!(found["Pokhara"][0].service, "tiling");
        let alerts = store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "1 high-demand services identified in Pokhara");
    }

    #[tokio::test]
    async fn test_onboarding_report_without_signups() {
        let (store, monitor) = monitor();
        let report = monitor.analyze_onboarding_trends().await.unwrap();

        assert_eq!(report.weekly_signups, 0);
        assert_eq!(report.verification_trend, "declining");
        assert_eq!(report.recruitment_recommendation, "increase_recruitment_efforts");
        assert_eq!(store.alerts().await[0].title, "Weekly Provider Onboarding Report");
    }
}
