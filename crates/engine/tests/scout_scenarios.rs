//! Provider scout scenarios: regional capacity, unmet demand and provider
//! performance reviews.
//!
//! Run with: cargo test --test scout_scenarios

mod common;

use chrono::{Duration, Utc};
use common::{test_service, TestBooking, TestHarness, TestProvider, TestUser};
use domain::models::{AlertLevel, BookingStatus};
use ops_engine::monitors::scout::ProviderIssue;

// ============================================================================
// Regional Capacity
// ============================================================================

#[tokio::test]
async fn test_capacity_strain_alerts_once_per_day() {
    let h = TestHarness::new().await;
    let service = test_service("Kathmandu", "plumbing");
    let user = TestUser::new().build();
    let provider = TestProvider::new("Kathmandu", "plumbing").build();
    h.store.insert_service(service.clone()).await;
    h.store.insert_user(user.clone()).await;
    h.store.insert_provider(provider).await;
    // 10 bookings over 3 days against one provider's 9-booking capacity.
    for _ in 0..10 {
        h.store
            .insert_booking(TestBooking::new(user.id, service.id).created_days_ago(1).build())
            .await;
    }

    let first = h
        .engine
        .monitors()
        .scout
        .analyze_region_capacity()
        .await
        .unwrap();
    assert_eq!(first.areas_analyzed, 1);
    assert_eq!(first.strain_alerts, 1);

    let second = h
        .engine
        .trigger_job("region-capacity-analysis")
        .await
        .unwrap();
    assert_eq!(second["strainAlerts"], 0);

    let alerts = h.store.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Provider Capacity Strain");
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert_eq!(alerts[0].details["availableProviders"], 1);
    assert_eq!(h.actions_triggered_by("Surge of demand in any region").await, 1);
}

#[tokio::test]
async fn test_area_without_providers_is_critical() {
    let h = TestHarness::new().await;
    let service = test_service("Pokhara", "cleaning");
    let user = TestUser::new().build();
    h.store.insert_service(service.clone()).await;
    h.store.insert_user(user.clone()).await;
    for _ in 0..2 {
        h.store
            .insert_booking(TestBooking::new(user.id, service.id).build())
            .await;
    }

    let summary = h
        .engine
        .monitors()
        .scout
        .analyze_region_capacity()
        .await
        .unwrap();

    assert_eq!(summary.strain_alerts, 0);
    assert_eq!(summary.zero_coverage_alerts, 1);
    let alerts = h.store.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Zero Provider Coverage");
    assert_eq!(alerts[0].level, AlertLevel::Critical);
}

// ============================================================================
// Unmet Demand
// ============================================================================

#[tokio::test]
async fn test_repeated_searches_become_opportunities() {
    let h = TestHarness::new().await;

    for term in ["Yoga Instructor", "yoga instructor ", "YOGA INSTRUCTOR"] {
        h.engine
            .log_unavailable_service(term, "Kathmandu", None)
            .await
            .unwrap();
    }
    h.engine
        .log_unavailable_service("pet grooming", "Kathmandu", None)
        .await
        .unwrap();

    let logs = h.store.service_requests().await;
    assert_eq!(logs.len(), 2);

    let opportunities = h
        .engine
        .monitors()
        .scout
        .identify_service_opportunities()
        .await
        .unwrap();

    let kathmandu = opportunities.get("Kathmandu").unwrap();
    assert_eq!(kathmandu.len(), 1);
    assert_eq!(kathmandu[0].service, "yoga instructor");
    assert_eq!(kathmandu[0].request_count, 3);
    assert_eq!(
        h.alerts_titled("New Service Opportunities Identified").await,
        1
    );
}

#[tokio::test]
async fn test_blank_search_is_rejected_and_audited() {
    let h = TestHarness::new().await;

    let result = h.engine.log_unavailable_service("   ", "Kathmandu", None).await;

    assert!(result.is_err());
    assert!(h.store.service_requests().await.is_empty());
    let actions = h.store.actions().await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].module, "ProviderScout");
    assert!(!actions[0].success);
}

// ============================================================================
// Provider Reviews
// ============================================================================

#[tokio::test]
async fn test_underperformers_are_reported() {
    let h = TestHarness::new().await;
    let service = test_service("Lalitpur", "electrician");
    let user = TestUser::new().build();
    let idle = TestProvider::new("Lalitpur", "electrician").build();
    let late = TestProvider::new("Lalitpur", "electrician")
        .with_on_time(55.0)
        .build();
    let steady = TestProvider::new("Lalitpur", "electrician").build();
    let mut newcomer = TestProvider::new("Lalitpur", "electrician").build();
    newcomer.created_at = Utc::now() - Duration::days(3);

    h.store.insert_service(service.clone()).await;
    h.store.insert_user(user.clone()).await;
    for provider in [&idle, &late, &steady, &newcomer] {
        h.store.insert_provider(provider.clone()).await;
    }
    for provider in [&late, &steady] {
        for _ in 0..4 {
            h.store
                .insert_booking(
                    TestBooking::new(user.id, service.id)
                        .assigned_to(provider.id)
                        .with_status(BookingStatus::Completed)
                        .build(),
                )
                .await;
        }
    }

    let underperformers = h
        .engine
        .monitors()
        .scout
        .identify_underperformers()
        .await
        .unwrap();

    assert_eq!(underperformers.len(), 2);
    let issues_of = |id| {
        underperformers
            .iter()
            .find(|u| u.provider_id == id)
            .map(|u| u.issues.clone())
    };
    assert_eq!(issues_of(idle.id), Some(vec![ProviderIssue::NoActivity]));
    assert_eq!(issues_of(late.id), Some(vec![ProviderIssue::LowPunctuality]));
    assert_eq!(issues_of(steady.id), None);
    assert_eq!(issues_of(newcomer.id), None);
    assert_eq!(
        h.alerts_titled("Underperforming Providers Identified").await,
        1
    );
}

#[tokio::test]
async fn test_onboarding_report_counts_recent_signups() {
    let h = TestHarness::new().await;
    for days in [2, 4, 20] {
        let mut provider = TestProvider::new("Bhaktapur", "painting").build();
        provider.created_at = Utc::now() - Duration::days(days);
        provider.verified = days != 4;
        h.store.insert_provider(provider).await;
    }

    let output = h
        .engine
        .trigger_job("provider-onboarding-analysis")
        .await
        .unwrap();

    assert_eq!(output["weeklySignups"], 2);
    assert_eq!(output["monthlySignups"], 3);
    assert_eq!(output["recruitmentRecommendation"], "increase_recruitment_efforts");
    assert_eq!(h.alerts_titled("Weekly Provider Onboarding Report").await, 1);
}
