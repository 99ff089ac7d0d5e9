//! Common test utilities for integration tests.
//!
//! Scenarios run against the in-memory store and a recording notification
//! port, so no database is needed.

// Not every suite uses every fixture.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, Router};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use domain::models::{
    Booking, BookingStatus, GeoFix, Provider, ProviderStatus, Referral, Review, Service, User,
};
use domain::services::MockNotificationPort;
use fake::faker::name::en::Name;
use fake::Fake;
use ops_engine::app::create_app;
use ops_engine::engine::{EngineSettings, OpsEngine};
use persistence::InMemoryStore;
use uuid::Uuid;

pub const KATHMANDU: (f64, f64) = (27.7172, 85.3240);
pub const POKHARA: (f64, f64) = (28.2096, 83.9856);

/// Engine wired to an in-memory store, plus handles for inspection.
pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub notifier: MockNotificationPort,
    pub engine: Arc<OpsEngine>,
}

impl TestHarness {
    /// Engine with timers off; events are dispatched once the router is
    /// started.
    pub async fn new() -> Self {
        let harness = Self::with_settings(EngineSettings {
            enabled: false,
            notification_rate_per_second: 1000,
            ..EngineSettings::default()
        });
        harness.engine.router().start().await;
        harness
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let notifier = MockNotificationPort::new();
        let engine = Arc::new(OpsEngine::new(
            store.clone(),
            Arc::new(notifier.clone()),
            settings,
        ));
        Self {
            store,
            notifier,
            engine,
        }
    }

    /// Waits for every queued mutation event to be handled.
    pub async fn settle(&self) {
        assert!(
            self.engine
                .router()
                .wait_until_idle(Duration::from_secs(5))
                .await,
            "event router did not go idle"
        );
    }

    pub fn app(&self) -> Router {
        create_app(self.engine.clone(), Duration::from_secs(10))
    }

    pub async fn alerts_titled(&self, title: &str) -> usize {
        self.store
            .alerts()
            .await
            .iter()
            .filter(|a| a.title == title)
            .count()
    }

    pub async fn actions_triggered_by(&self, trigger: &str) -> usize {
        self.store
            .actions()
            .await
            .iter()
            .filter(|a| a.trigger == trigger)
            .count()
    }
}

/// A Nepali mobile number of the `98XXXXXXXX` form.
pub fn unique_phone() -> String {
    format!("98{:08}", (0..100_000_000u32).fake::<u32>())
}

pub fn test_service(city: &str, category: &str) -> Service {
    Service {
        id: Uuid::new_v4(),
        name: format!("{} service", category),
        category: category.to_string(),
        city: city.to_string(),
        is_active: true,
    }
}

/// Test user data.
#[derive(Debug, Clone)]
pub struct TestUser {
    user: User,
}

impl TestUser {
    pub fn new() -> Self {
        Self {
            user: User {
                id: Uuid::new_v4(),
                name: Name().fake(),
                phone: unique_phone(),
                coins: 0,
                last_seen: Some(Utc::now()),
                shadow_banned: false,
                created_at: Utc::now() - ChronoDuration::days(30),
            },
        }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.user.phone = phone.to_string();
        self
    }

    pub fn last_seen(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.user.last_seen = at;
        self
    }

    pub fn build(self) -> User {
        self.user
    }
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new()
    }
}

/// Test provider data.
#[derive(Debug, Clone)]
pub struct TestProvider {
    provider: Provider,
}

impl TestProvider {
    /// An active, online, verified provider covering one city and category.
    pub fn new(city: &str, category: &str) -> Self {
        Self {
            provider: Provider {
                id: Uuid::new_v4(),
                name: Name().fake(),
                phone: unique_phone(),
                status: ProviderStatus::Active,
                is_online: true,
                verified: true,
                skills: vec![category.to_string()],
                zones: vec![city.to_string()],
                on_time_pct: 95.0,
                completion_pct: 97.0,
                location: None,
                created_at: Utc::now() - ChronoDuration::days(60),
            },
        }
    }

    pub fn offline(mut self) -> Self {
        self.provider.is_online = false;
        self
    }

    pub fn with_on_time(mut self, on_time_pct: f64) -> Self {
        self.provider.on_time_pct = on_time_pct;
        self
    }

    pub fn located_at(mut self, (latitude, longitude): (f64, f64), recorded_at: DateTime<Utc>) -> Self {
        self.provider.location = Some(GeoFix {
            latitude,
            longitude,
            recorded_at,
        });
        self
    }

    pub fn build(self) -> Provider {
        self.provider
    }
}

/// Test booking data.
#[derive(Debug, Clone)]
pub struct TestBooking {
    booking: Booking,
}

impl TestBooking {
    /// A pending booking created an hour ago.
    pub fn new(user_id: Uuid, service_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            booking: Booking {
                id: Uuid::new_v4(),
                user_id,
                provider_id: None,
                service_id,
                status: BookingStatus::Pending,
                scheduled_at: Some(now + ChronoDuration::hours(2)),
                total: (500..5000i64).fake(),
                accepted_at: None,
                cancelled_by: None,
                created_at: now - ChronoDuration::hours(1),
                updated_at: now - ChronoDuration::hours(1),
            },
        }
    }

    pub fn assigned_to(mut self, provider_id: Uuid) -> Self {
        self.booking.status = BookingStatus::Assigned;
        self.booking.provider_id = Some(provider_id);
        self.booking.accepted_at = Some(self.booking.created_at + ChronoDuration::minutes(2));
        self
    }

    /// Scheduled this many minutes in the past.
    pub fn overdue_by(mut self, minutes: i64) -> Self {
        self.booking.scheduled_at = Some(Utc::now() - ChronoDuration::minutes(minutes));
        self
    }

    pub fn created_days_ago(mut self, days: i64) -> Self {
        self.booking.created_at = Utc::now() - ChronoDuration::days(days);
        self
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.booking.status = status;
        self
    }

    pub fn build(self) -> Booking {
        self.booking
    }
}

pub fn test_review(booking: &Booking, provider_id: Uuid, rating: i16) -> Review {
    Review {
        id: Uuid::new_v4(),
        booking_id: booking.id,
        provider_id,
        rating,
        comment: Some("Test review".to_string()),
        created_at: Utc::now(),
    }
}

pub fn test_referral(referrer_id: Uuid, referred_id: Option<Uuid>) -> Referral {
    Referral {
        id: Uuid::new_v4(),
        referrer_id,
        referred_id,
        redeemed_at: None,
        created_at: Utc::now() - ChronoDuration::days(2),
    }
}

/// Build a JSON request for the operator API.
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Parse a response body as JSON.
pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "Failed to parse response body: {:?}",
            String::from_utf8_lossy(&body)
        )
    })
}
