use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::engine::OpsEngine;
use crate::middleware::{metrics_handler, metrics_middleware};
use crate::routes::{health, ops};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OpsEngine>,
}

/// Operator-facing router: health, metrics, engine status and manual
/// triggers.
pub fn create_app(engine: Arc<OpsEngine>, request_timeout: Duration) -> Router {
    let state = AppState { engine };

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let ops_routes = Router::new()
        .route("/api/v1/ops/status", get(ops::status))
        .route("/api/v1/ops/jobs/:name/trigger", post(ops::trigger_job))
        .route("/api/v1/ops/triggers/welcome", post(ops::trigger_welcome))
        .route(
            "/api/v1/ops/triggers/performance",
            post(ops::trigger_performance),
        )
        .route(
            "/api/v1/ops/triggers/phone-abuse",
            post(ops::trigger_phone_abuse),
        )
        .route(
            "/api/v1/ops/triggers/fake-location",
            post(ops::trigger_fake_location),
        )
        .route(
            "/api/v1/ops/triggers/cancellation",
            post(ops::trigger_cancellation),
        )
        .route(
            "/api/v1/ops/triggers/unavailable-service",
            post(ops::log_unavailable_service),
        )
        .route("/api/v1/ops/triggers/referral", post(ops::trigger_referral));

    Router::new()
        .merge(public_routes)
        .merge(ops_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
