//! Operator endpoints: engine status, manual job runs and manual event
//! triggers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::engine::EngineStatus;
use crate::error::ApiError;
use crate::jobs::JobOutput;
use crate::monitors::flow::{CancellationOutcome, PerformanceOutcome, ReviewEvent};
use crate::monitors::growth::{ReferralOutcome, WelcomeOutcome};
use crate::monitors::security::{LocationOutcome, PhoneAbuseOutcome};
use domain::models::ServiceRequestLog;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeRequest {
    pub user_id: Uuid,

    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRequest {
    pub provider_id: Uuid,
    pub review_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,

    #[validate(custom(function = "shared::validation::validate_rating"))]
    pub rating: i16,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PhoneAbuseRequest {
    pub user_id: Uuid,

    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,

    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FakeLocationRequest {
    pub provider_id: Uuid,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableServiceRequest {
    #[validate(custom(function = "shared::validation::validate_search_term"))]
    pub search_term: String,

    #[validate(length(min = 1, max = 100, message = "City must be between 1 and 100 characters"))]
    pub city: String,

    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRequest {
    pub referral_id: Uuid,

    #[validate(range(min = 0, message = "Booking amount cannot be negative"))]
    pub booking_amount: i64,
}

/// GET /api/v1/ops/status
pub async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.engine.status().await)
}

/// POST /api/v1/ops/jobs/:name/trigger
pub async fn trigger_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JobOutput>, ApiError> {
    Ok(Json(state.engine.trigger_job(&name).await?))
}

/// POST /api/v1/ops/triggers/welcome
pub async fn trigger_welcome(
    State(state): State<AppState>,
    Json(request): Json<WelcomeRequest>,
) -> Result<Json<WelcomeOutcome>, ApiError> {
    request.validate()?;
    let outcome = state
        .engine
        .trigger_welcome_message(request.user_id, &request.phone)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/ops/triggers/performance
pub async fn trigger_performance(
    State(state): State<AppState>,
    Json(request): Json<PerformanceRequest>,
) -> Result<Json<PerformanceOutcome>, ApiError> {
    request.validate()?;
    let review = ReviewEvent {
        review_id: request.review_id,
        provider_id: request.provider_id,
        booking_id: request.booking_id,
        rating: request.rating,
    };
    Ok(Json(state.engine.trigger_performance_check(review).await?))
}

/// POST /api/v1/ops/triggers/phone-abuse
pub async fn trigger_phone_abuse(
    State(state): State<AppState>,
    Json(request): Json<PhoneAbuseRequest>,
) -> Result<Json<PhoneAbuseOutcome>, ApiError> {
    request.validate()?;
    let outcome = state
        .engine
        .trigger_phone_abuse_check(request.user_id, &request.phone, request.booking_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/ops/triggers/fake-location
pub async fn trigger_fake_location(
    State(state): State<AppState>,
    Json(request): Json<FakeLocationRequest>,
) -> Result<Json<LocationOutcome>, ApiError> {
    request.validate()?;
    let outcome = state
        .engine
        .trigger_fake_location_check(request.provider_id, request.latitude, request.longitude)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/ops/triggers/cancellation
pub async fn trigger_cancellation(
    State(state): State<AppState>,
    Json(request): Json<CancellationRequest>,
) -> Result<Json<CancellationOutcome>, ApiError> {
    let outcome = state
        .engine
        .trigger_provider_cancellation(request.booking_id)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/ops/triggers/unavailable-service
pub async fn log_unavailable_service(
    State(state): State<AppState>,
    Json(request): Json<UnavailableServiceRequest>,
) -> Result<Json<ServiceRequestLog>, ApiError> {
    request.validate()?;
    let logged = state
        .engine
        .log_unavailable_service(&request.search_term, &request.city, request.user_id)
        .await?;
    Ok(Json(logged))
}

/// POST /api/v1/ops/triggers/referral
pub async fn trigger_referral(
    State(state): State<AppState>,
    Json(request): Json<ReferralRequest>,
) -> Result<Json<ReferralOutcome>, ApiError> {
    request.validate()?;
    let outcome = state
        .engine
        .trigger_referral_reward(request.referral_id, request.booking_amount)
        .await?;
    Ok(Json(outcome))
}
