//! Empire watchdog scenarios: weekly reports and daily health checks.
//!
//! Run with: cargo test --test reporting_scenarios

mod common;

use chrono::Utc;
use common::{test_service, TestBooking, TestHarness, TestProvider, TestUser};
use domain::models::{AlertLevel, BookingStatus};
use domain::services::week_boundary;
use ops_engine::monitors::reporting::ReportOutcome;

// ============================================================================
// Weekly Report
// ============================================================================

#[tokio::test]
async fn test_weekly_report_is_written_once_per_week() {
    let h = TestHarness::new().await;
    let service = test_service("Kathmandu", "plumbing");
    let user = TestUser::new().build();
    h.store.insert_service(service.clone()).await;
    h.store.insert_user(user.clone()).await;

    let mut revenue = 0;
    for status in [
        BookingStatus::Completed,
        BookingStatus::Completed,
        BookingStatus::Pending,
    ] {
        let booking = TestBooking::new(user.id, service.id)
            .with_status(status)
            .created_days_ago(0)
            .build();
        if status == BookingStatus::Completed {
            revenue += booking.total;
        }
        h.store.insert_booking(booking).await;
    }

    let expected_week = week_boundary(Utc::now(), chrono_tz::Asia::Kathmandu).week_ending;

    let first = h
        .engine
        .monitors()
        .reporting
        .generate_weekly_report()
        .await
        .unwrap();
    let ReportOutcome::Created { week_ending, .. } = first else {
        panic!("expected a new report, got {:?}", first);
    };
    assert_eq!(week_ending, expected_week);

    let second = h
        .engine
        .monitors()
        .reporting
        .generate_weekly_report()
        .await
        .unwrap();
    assert_eq!(
        second,
        ReportOutcome::AlreadyExists {
            week_ending: expected_week
        }
    );

    let reports = h.store.reports().await;
    assert_eq!(reports.len(), 1);
    let summary = &reports[0].summary;
    assert_eq!(summary["bookings"]["total"], 3);
    assert_eq!(summary["bookings"]["completed"], 2);
    assert_eq!(summary["revenue"]["total"], revenue);
    assert_eq!(summary["bookings"]["byCity"]["Kathmandu"], 3);

    let alerts = h.store.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Weekly Empire Report Generated");
    assert_eq!(alerts[0].level, AlertLevel::Info);
    assert_eq!(h.actions_triggered_by("Weekly Summary Generation").await, 1);
}

#[tokio::test]
async fn test_weekly_report_job_output() {
    let h = TestHarness::new().await;

    let output = h
        .engine
        .trigger_job("weekly-report-generation")
        .await
        .unwrap();
    assert_eq!(output["outcome"], "created");

    let again = h
        .engine
        .trigger_job("weekly-report-generation")
        .await
        .unwrap();
    assert_eq!(again["outcome"], "alreadyExists");
}

// ============================================================================
// System Health
// ============================================================================

#[tokio::test]
async fn test_empty_marketplace_reports_health_issues() {
    let h = TestHarness::new().await;

    let report = h
        .engine
        .monitors()
        .reporting
        .monitor_system_health()
        .await
        .unwrap();

    assert!(!report.is_healthy());
    let unhealthy: Vec<&str> = report.issues().map(|c| c.component).collect();
    assert_eq!(unhealthy, vec!["bookings", "providers"]);

    let alerts = h.store.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "System Health Issues Detected");
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert_eq!(h.actions_triggered_by("Daily system health check").await, 1);
}

#[tokio::test]
async fn test_busy_marketplace_is_healthy() {
    let h = TestHarness::new().await;
    let service = test_service("Kathmandu", "plumbing");
    let user = TestUser::new().build();
    let provider = TestProvider::new("Kathmandu", "plumbing").build();
    h.store.insert_service(service.clone()).await;
    h.store.insert_user(user.clone()).await;
    h.store.insert_provider(provider).await;
    h.store
        .insert_booking(TestBooking::new(user.id, service.id).build())
        .await;

    let output = h
        .engine
        .trigger_job("system-health-monitoring")
        .await
        .unwrap();

    let checks = output["checks"].as_array().unwrap();
    assert_eq!(checks.len(), 4);
    assert!(checks.iter().all(|c| c["healthy"] == true));
    assert!(h.store.alerts().await.is_empty());
    assert_eq!(h.actions_triggered_by("Daily system health check").await, 1);
}
