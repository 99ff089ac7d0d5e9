//! Integration tests for the operator HTTP surface and engine lifecycle.
//!
//! Run with: cargo test --test engine_integration

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{
    get_request, json_request, parse_response_body, TestHarness, TestProvider, TestUser, KATHMANDU,
};
use ops_engine::engine::EngineSettings;
use ops_engine::jobs::MonitorTask;
use ops_engine::middleware::init_metrics;
use serde_json::json;
use tower::ServiceExt;

// ============================================================================
// Health and Metrics
// ============================================================================

#[tokio::test]
async fn test_health_check_reports_store_and_engine() {
    let h = TestHarness::new().await;

    let response = h.app().oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);
    assert_eq!(body["engine"]["initialized"], false);
    assert_eq!(body["engine"]["scheduled_jobs"], 0);
}

#[tokio::test]
async fn test_liveness_endpoint() {
    let h = TestHarness::new().await;

    let response = h.app().oneshot(get_request("/health/live")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await, json!({ "status": "alive" }));
}

#[tokio::test]
async fn test_metrics_endpoint_renders_prometheus_text() {
    tokio_test::assert_ok!(init_metrics());
    let h = TestHarness::new().await;
    h.engine.trigger_job("security-flag-review").await.unwrap();

    let response = h.app().oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("ops_job_runs_total"));
}

// ============================================================================
// Engine Lifecycle
// ============================================================================

#[tokio::test]
async fn test_status_lists_every_job_after_init() {
    let h = TestHarness::with_settings(EngineSettings::default());
    tokio_test::assert_ok!(h.engine.init().await);

    let response = h.app().oneshot(get_request("/api/v1/ops/status")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["initialized"], true);
    assert_eq!(body["enabled"], true);
    assert_eq!(body["timezone"], "Asia/Kathmandu");
    let jobs = body["scheduledJobs"].as_array().unwrap();
    assert_eq!(jobs.len(), MonitorTask::ALL.len());
    assert!(jobs.iter().all(|j| j["running"] == true && j["nextRun"].is_string()));
    assert!(body["eventStats"]["enqueued"].is_u64());

    h.engine.shutdown(Duration::from_secs(1)).await;
    let status = h.engine.status().await;
    assert!(!status.initialized);
    assert!(status.scheduled_jobs.iter().all(|j| !j.running));
}

#[tokio::test]
async fn test_events_flow_after_engine_init() {
    let h = TestHarness::with_settings(EngineSettings::default());
    tokio_test::assert_ok!(h.engine.init().await);
    let user = TestUser::new().build();
    h.store.insert_user(user.clone()).await;

    let created = h
        .engine
        .router()
        .intercept(
            async { Ok::<_, std::convert::Infallible>(user.clone()) },
            |u| ops_engine::events::MutationEvent::created(u.clone()),
        )
        .await;
    tokio_test::assert_ok!(created);
    h.settle().await;

    assert_eq!(h.notifier.sent_to(&user.phone).await.len(), 1);
    assert_eq!(h.engine.router().dispatch_stats().handled, 1);
    h.engine.shutdown(Duration::from_secs(1)).await;
}

// ============================================================================
// Job Triggers
// ============================================================================

#[tokio::test]
async fn test_trigger_known_job() {
    let h = TestHarness::new().await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/jobs/system-health-monitoring/trigger",
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["checks"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_trigger_unknown_job_is_not_found() {
    let h = TestHarness::new().await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/jobs/does-not-exist/trigger",
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "not_found");
}

// ============================================================================
// Manual Triggers
// ============================================================================

#[tokio::test]
async fn test_welcome_trigger_credits_user() {
    let h = TestHarness::new().await;
    let user = TestUser::new().build();
    h.store.insert_user(user.clone()).await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/triggers/welcome",
            json!({ "userId": user.id, "phone": user.phone }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["messageSent"], true);
    assert_eq!(body["balance"], 50);
    assert!(body["couponCode"].as_str().unwrap().starts_with("SEWAGO"));
}

#[tokio::test]
async fn test_welcome_trigger_for_unknown_user() {
    let h = TestHarness::new().await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/triggers/welcome",
            json!({ "userId": uuid::Uuid::new_v4(), "phone": "9800000000" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fake_location_trigger_validates_coordinates() {
    let h = TestHarness::new().await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/triggers/fake-location",
            json!({
                "providerId": uuid::Uuid::new_v4(),
                "latitude": 95.0,
                "longitude": 85.3,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "latitude");
}

#[tokio::test]
async fn test_fake_location_trigger_flags_provider() {
    let h = TestHarness::new().await;
    let provider = TestProvider::new("Kathmandu", "plumbing")
        .located_at(KATHMANDU, chrono::Utc::now() - chrono::Duration::minutes(5))
        .build();
    h.store.insert_provider(provider.clone()).await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/triggers/fake-location",
            json!({
                "providerId": provider.id,
                "latitude": 28.2096,
                "longitude": 83.9856,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["outcome"], "flagged");
    assert_eq!(h.store.flags().await.len(), 1);
}

#[tokio::test]
async fn test_performance_trigger_rejects_out_of_range_rating() {
    let h = TestHarness::new().await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/triggers/performance",
            json!({ "providerId": uuid::Uuid::new_v4(), "rating": 9 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.actions().await.is_empty());
}

#[tokio::test]
async fn test_unavailable_service_trigger_counts_searches() {
    let h = TestHarness::new().await;
    let app = h.app();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/ops/triggers/unavailable-service",
                json!({ "searchTerm": "Tailoring", "city": "Pokhara" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let logs = h.store.service_requests().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].search_term, "tailoring");
    assert_eq!(logs[0].count, 2);
}

#[tokio::test]
async fn test_cancellation_trigger_for_unknown_booking() {
    let h = TestHarness::new().await;

    let response = h
        .app()
        .oneshot(json_request(
            "POST",
            "/api/v1/ops/triggers/cancellation",
            json!({ "bookingId": uuid::Uuid::new_v4() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let actions = h.store.actions().await;
    assert_eq!(actions.len(), 1);
    assert!(!actions[0].success);
}
