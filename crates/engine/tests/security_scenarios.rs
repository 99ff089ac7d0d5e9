//! Security shield scenarios: shared phone numbers, impossible travel and
//! booking floods.
//!
//! Run with: cargo test --test security_scenarios

mod common;

use chrono::{Duration, Utc};
use common::{
    test_service, TestBooking, TestHarness, TestProvider, TestUser, KATHMANDU, POKHARA,
};
use domain::models::{AlertLevel, FlagSubject, FlagType, GeoFix, ProviderStatus};
use ops_engine::events::MutationHook;
use ops_engine::monitors::security::{LocationOutcome, PhoneAbuseOutcome};

// ============================================================================
// Phone Number Abuse
// ============================================================================

#[tokio::test]
async fn test_third_booking_on_shared_phone_is_flagged() {
    let h = TestHarness::new().await;
    let service = test_service("Kathmandu", "plumbing");
    let existing = TestUser::new().with_phone("9841000111").build();
    let newcomer = TestUser::new().with_phone("984-100-0111").build();

    h.store.insert_service(service.clone()).await;
    h.store.insert_user(existing.clone()).await;
    h.store.insert_user(newcomer.clone()).await;
    for _ in 0..2 {
        h.store
            .insert_booking(TestBooking::new(existing.id, service.id).build())
            .await;
    }

    let booking = TestBooking::new(newcomer.id, service.id).build();
    h.store.insert_booking(booking.clone()).await;
    h.engine.hook().on_created(booking.clone().into());
    h.settle().await;

    let flags = h.store.flags().await;
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].flag_type, FlagType::PotentialAbuse);
    assert_eq!(flags[0].subject, FlagSubject::User(newcomer.id));
    assert_eq!(flags[0].details["totalBookingsWithPhone"], 3);
    assert_eq!(flags[0].details["triggerBookingId"], booking.id.to_string());

    let alerts = h.store.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Potential Phone Number Abuse Detected");
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert_eq!(
        h.actions_triggered_by("User making 3 bookings with same number")
            .await,
        1
    );
}

#[tokio::test]
async fn test_second_booking_on_shared_phone_is_not_flagged() {
    let h = TestHarness::new().await;
    let service = test_service("Kathmandu", "plumbing");
    let existing = TestUser::new().with_phone("9841000222").build();
    let newcomer = TestUser::new().with_phone("9841000222").build();

    h.store.insert_service(service.clone()).await;
    h.store.insert_user(existing.clone()).await;
    h.store.insert_user(newcomer.clone()).await;
    h.store
        .insert_booking(TestBooking::new(existing.id, service.id).build())
        .await;

    let outcome = h
        .engine
        .trigger_phone_abuse_check(newcomer.id, &newcomer.phone, None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PhoneAbuseOutcome::BelowThreshold {
            accounts: 2,
            total_bookings: 2
        }
    );
    assert!(h.store.flags().await.is_empty());
    assert!(h.store.alerts().await.is_empty());
}

#[tokio::test]
async fn test_unique_phone_is_never_flagged() {
    let h = TestHarness::new().await;
    let user = TestUser::new().build();
    h.store.insert_user(user.clone()).await;

    let outcome = h
        .engine
        .trigger_phone_abuse_check(user.id, &user.phone, None)
        .await
        .unwrap();

    assert_eq!(outcome, PhoneAbuseOutcome::Unique);
}

#[tokio::test]
async fn test_booking_by_unknown_user_is_audited_as_failure() {
    let h = TestHarness::new().await;
    let booking = TestBooking::new(uuid::Uuid::new_v4(), uuid::Uuid::new_v4()).build();

    h.engine.hook().on_created(booking.into());
    h.settle().await;

    assert_eq!(h.engine.router().dispatch_stats().failed, 1);
    let actions = h.store.actions().await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].module, "SecurityShield");
    assert_eq!(actions[0].trigger, "New booking");
    assert!(!actions[0].success);
}

// ============================================================================
// Fake Location
// ============================================================================

#[tokio::test]
async fn test_impossible_travel_pauses_provider() {
    let h = TestHarness::new().await;
    let before = TestProvider::new("Kathmandu", "plumbing")
        .located_at(KATHMANDU, Utc::now() - Duration::minutes(5))
        .build();
    let mut after = before.clone();
    after.location = Some(GeoFix {
        latitude: POKHARA.0,
        longitude: POKHARA.1,
        recorded_at: Utc::now(),
    });
    h.store.insert_provider(after.clone()).await;

    h.engine.hook().on_updated(before.into(), after.clone().into());
    h.settle().await;

    assert_eq!(
        h.store.provider(after.id).await.unwrap().status,
        ProviderStatus::Paused
    );
    let flags = h.store.flags().await;
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].flag_type, FlagType::FakeLocation);
    assert_eq!(flags[0].subject, FlagSubject::Provider(after.id));
    assert!(flags[0].details["speedKmh"].as_f64().unwrap() > 100.0);

    let alerts = h.store.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Fake Location Detected");
    assert_eq!(alerts[0].level, AlertLevel::Critical);
    assert_eq!(h.actions_triggered_by("Provider using fake location").await, 1);
}

#[tokio::test]
async fn test_ordinary_movement_is_plausible() {
    let h = TestHarness::new().await;
    // About 1.1 km north over ten minutes.
    let provider = TestProvider::new("Kathmandu", "plumbing")
        .located_at(KATHMANDU, Utc::now() - Duration::minutes(10))
        .build();
    h.store.insert_provider(provider.clone()).await;

    let outcome = h
        .engine
        .trigger_fake_location_check(provider.id, KATHMANDU.0 + 0.01, KATHMANDU.1)
        .await
        .unwrap();

    match outcome {
        LocationOutcome::Plausible { speed_kmh } => assert!(speed_kmh < 10.0),
        other => panic!("expected plausible travel, got {:?}", other),
    }
    assert_eq!(
        h.store.provider(provider.id).await.unwrap().status,
        ProviderStatus::Active
    );
    assert!(h.store.flags().await.is_empty());
}

#[tokio::test]
async fn test_fixes_within_a_minute_are_never_flagged() {
    let h = TestHarness::new().await;
    // Reports 30 seconds apart are too close to judge, however far apart.
    let provider = TestProvider::new("Kathmandu", "plumbing")
        .located_at(KATHMANDU, Utc::now() - Duration::seconds(30))
        .build();
    h.store.insert_provider(provider.clone()).await;

    let outcome = h
        .engine
        .trigger_fake_location_check(provider.id, POKHARA.0, POKHARA.1)
        .await
        .unwrap();

    assert!(matches!(outcome, LocationOutcome::Plausible { .. }));
    assert!(h.store.flags().await.is_empty());
}

#[tokio::test]
async fn test_first_fix_is_a_baseline() {
    let h = TestHarness::new().await;
    let provider = TestProvider::new("Kathmandu", "plumbing").build();
    h.store.insert_provider(provider.clone()).await;

    let outcome = h
        .engine
        .trigger_fake_location_check(provider.id, POKHARA.0, POKHARA.1)
        .await
        .unwrap();
    assert_eq!(outcome, LocationOutcome::Baseline);

    // The same through the router: no previous fix, nothing to compare.
    let mut moved = provider.clone();
    moved.location = Some(GeoFix {
        latitude: KATHMANDU.0,
        longitude: KATHMANDU.1,
        recorded_at: Utc::now(),
    });
    h.engine.hook().on_updated(provider.into(), moved.into());
    h.settle().await;

    assert!(h.store.flags().await.is_empty());
    assert!(h.store.alerts().await.is_empty());
}

#[tokio::test]
async fn test_manual_check_compares_with_stored_location() {
    let h = TestHarness::new().await;
    let provider = TestProvider::new("Kathmandu", "plumbing")
        .located_at(KATHMANDU, Utc::now() - Duration::minutes(5))
        .build();
    h.store.insert_provider(provider.clone()).await;

    let outcome = h
        .engine
        .trigger_fake_location_check(provider.id, POKHARA.0, POKHARA.1)
        .await
        .unwrap();

    assert!(matches!(outcome, LocationOutcome::Flagged { .. }));
    assert_eq!(
        h.store.provider(provider.id).await.unwrap().status,
        ProviderStatus::Paused
    );
}

// ============================================================================
// Suspicious Patterns
// ============================================================================

#[tokio::test]
async fn test_booking_flood_is_flagged_once_per_day() {
    let h = TestHarness::new().await;
    let service = test_service("Kathmandu", "cleaning");
    let flooder = TestUser::new().build();
    let regular = TestUser::new().build();
    h.store.insert_service(service.clone()).await;
    h.store.insert_user(flooder.clone()).await;
    h.store.insert_user(regular.clone()).await;
    for _ in 0..11 {
        h.store
            .insert_booking(TestBooking::new(flooder.id, service.id).build())
            .await;
    }
    for _ in 0..10 {
        h.store
            .insert_booking(TestBooking::new(regular.id, service.id).build())
            .await;
    }

    let first = h
        .engine
        .trigger_job("suspicious-pattern-detection")
        .await
        .unwrap();
    assert_eq!(first["excessiveBookersFlagged"], 1);

    let second = h
        .engine
        .trigger_job("suspicious-pattern-detection")
        .await
        .unwrap();
    assert_eq!(second["excessiveBookersFlagged"], 0);

    let flags = h.store.flags().await;
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].subject, FlagSubject::User(flooder.id));
    assert_eq!(flags[0].flag_type, FlagType::ExcessiveBookings);
    assert_eq!(h.alerts_titled("Excessive Booking Activity").await, 1);
}
