//! Security monitor: shared phone numbers, spoofed locations and
//! automation-like behavior.

use chrono::{Duration, Utc};
use domain::models::{
    FlagSubject, FlagType, GeoFix, NewAutomatedAction, NewSecurityFlag, NewSystemAlert,
};
use domain::services::{DedupClaim, Travel};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{MonitorDeps, MonitorError, MonitorResult};

pub const MODULE: &str = "SecurityShield";

/// Bookings across accounts sharing a phone number that raise a flag.
pub const PHONE_ABUSE_BOOKING_THRESHOLD: i64 = 3;

/// A user with more bookings than this in the trailing day is flagged.
pub const EXCESSIVE_BOOKINGS_PER_DAY: i64 = 10;

/// Providers need at least this many accepted bookings to be judged.
pub const MIN_RESPONSES_FOR_AUTOMATION_CHECK: i64 = 5;

/// Mean acceptance latency below this looks automated.
pub const AUTOMATED_RESPONSE_SECS: f64 = 5.0;

/// Low-priority flags nobody reviewed within this many days are dismissed.
pub const STALE_FLAG_DAYS: i64 = 7;

const PATTERN_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PhoneAbuseOutcome {
    /// No other account uses the number.
    Unique,
    BelowThreshold { accounts: usize, total_bookings: i64 },
    Flagged {
        flag_id: Uuid,
        accounts: usize,
        total_bookings: i64,
    },
}

/// A provider location change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationUpdate {
    pub provider_id: Uuid,
    /// Last known fix; `None` for the first fix ever reported.
    pub previous: Option<GeoFix>,
    pub current: GeoFix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum LocationOutcome {
    /// First fix; nothing to compare against.
    Baseline,
    Plausible { speed_kmh: f64 },
    Flagged { flag_id: Uuid, speed_kmh: f64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousPatternSummary {
    pub excessive_bookers_flagged: usize,
    pub automated_responders_flagged: usize,
}

pub struct SecurityMonitor {
    deps: MonitorDeps,
}

impl SecurityMonitor {
    pub fn new(deps: MonitorDeps) -> Self {
        Self { deps }
    }

    /// Flags a booking user whose phone number is shared with other accounts
    /// once the accounts together reach the booking threshold.
    pub async fn check_phone_number_abuse(
        &self,
        user_id: Uuid,
        phone: &str,
        booking_id: Option<Uuid>,
    ) -> MonitorResult<PhoneAbuseOutcome> {
        let others = self.deps.store.find_users_by_phone(phone, user_id).await?;
        if others.is_empty() {
            return Ok(PhoneAbuseOutcome::Unique);
        }

        let mut duplicates = Vec::with_capacity(others.len());
        // Counts the booking that triggered the check.
        let mut total_bookings = 1;
        for other in &others {
            let count = self.deps.store.count_bookings_for_user(other.id).await?;
            total_bookings += count;
            duplicates.push(json!({
                "userId": other.id,
                "bookingCount": count,
                "createdAt": other.created_at,
            }));
        }

        let accounts = others.len() + 1;
        if total_bookings < PHONE_ABUSE_BOOKING_THRESHOLD {
            debug!(user_id = %user_id, accounts, total_bookings, "Shared phone below threshold");
            return Ok(PhoneAbuseOutcome::BelowThreshold {
                accounts,
                total_bookings,
            });
        }

        let flag = self
            .deps
            .store
            .insert_security_flag(NewSecurityFlag {
                subject: FlagSubject::User(user_id),
                flag_type: FlagType::PotentialAbuse,
                details: json!({
                    "phoneNumber": phone,
                    "triggerBookingId": booking_id,
                    "duplicateAccounts": duplicates,
                    "totalBookingsWithPhone": total_bookings,
                }),
            })
            .await?;

        self.deps
            .sink
            .create_system_alert(NewSystemAlert::warning(
                "Potential Phone Number Abuse Detected",
                format!(
                    "Phone number {} used across {} accounts with {} total bookings",
                    phone, accounts, total_bookings
                ),
                json!({
                    "userId": user_id,
                    "phoneNumber": phone,
                    "accountCount": accounts,
                    "totalBookings": total_bookings,
                    "triggerBookingId": booking_id,
                }),
            ))
            .await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "User making 3 bookings with same number",
                "Created security flag for potential phone abuse",
                json!({
                    "userId": user_id,
                    "flagId": flag.id,
                    "accountCount": accounts,
                    "totalBookings": total_bookings,
                }),
            ))
            .await;

        warn!(user_id = %user_id, accounts, total_bookings, "Phone number abuse flagged");
        Ok(PhoneAbuseOutcome::Flagged {
            flag_id: flag.id,
            accounts,
            total_bookings,
        })
    }

    /// Pauses a provider whose consecutive fixes imply impossible travel.
    pub async fn check_fake_location(&self, update: LocationUpdate) -> MonitorResult<LocationOutcome> {
        let Some(previous) = update.previous else {
            return Ok(LocationOutcome::Baseline);
        };

        let travel = Travel::between(&previous, &update.current);
        if !travel.is_implausible() {
            return Ok(LocationOutcome::Plausible {
                speed_kmh: travel.speed_kmh,
            });
        }

        let provider = self
            .deps
            .store
            .get_provider(update.provider_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("provider {}", update.provider_id)))?;

        let flag = self
            .deps
            .store
            .pause_provider_with_flag(
                provider.id,
                NewSecurityFlag {
                    subject: FlagSubject::Provider(provider.id),
                    flag_type: FlagType::FakeLocation,
                    details: json!({
                        "lastLocation": { "lat": previous.latitude, "lng": previous.longitude },
                        "newLocation": { "lat": update.current.latitude, "lng": update.current.longitude },
                        "distanceKm": travel.distance_meters / 1000.0,
                        "timeDiffSeconds": travel.elapsed_secs,
                        "speedKmh": travel.speed_kmh,
                        "maxAllowedSpeed": domain::services::geo::MAX_PLAUSIBLE_SPEED_KMH,
                        "lastUpdate": previous.recorded_at,
                        "currentUpdate": update.current.recorded_at,
                    }),
                },
            )
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("provider {}", provider.id)))?;

        self.deps
            .sink
            .create_system_alert(NewSystemAlert::critical(
                "Fake Location Detected",
                format!(
                    "Provider {} ({}) detected traveling at {:.1} km/h - account paused",
                    provider.name, provider.id, travel.speed_kmh
                ),
                json!({
                    "providerId": provider.id,
                    "speedKmh": travel.speed_kmh,
                    "distanceKm": travel.distance_meters / 1000.0,
                    "timeDiffSeconds": travel.elapsed_secs,
                }),
            ))
            .await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Provider using fake location",
                "Paused provider account and created security flag for impossible travel speed",
                json!({
                    "providerId": provider.id,
                    "flagId": flag.id,
                    "speedKmh": travel.speed_kmh,
                }),
            ))
            .await;

        warn!(
            provider_id = %provider.id,
            speed_kmh = travel.speed_kmh,
            "Provider paused for impossible travel speed"
        );
        Ok(LocationOutcome::Flagged {
            flag_id: flag.id,
            speed_kmh: travel.speed_kmh,
        })
    }

    /// Flags excessive bookers and providers that accept suspiciously fast.
    /// Each subject is flagged at most once per trailing day.
    pub async fn detect_suspicious_patterns(&self) -> MonitorResult<SuspiciousPatternSummary> {
        let since = Utc::now() - Duration::hours(PATTERN_WINDOW_HOURS);
        let window = Duration::hours(PATTERN_WINDOW_HOURS);
        let mut summary = SuspiciousPatternSummary::default();

        let heavy_bookers = self
            .deps
            .store
            .list_high_volume_bookers(since, EXCESSIVE_BOOKINGS_PER_DAY)
            .await?;
        for volume in heavy_bookers {
            let claim =
                DedupClaim::for_window(format!("excessive-bookings:{}", volume.user_id), window);
            let flag = self
                .deps
                .store
                .insert_security_flag_once(
                    NewSecurityFlag {
                        subject: FlagSubject::User(volume.user_id),
                        flag_type: FlagType::ExcessiveBookings,
                        details: json!({
                            "bookingCount": volume.bookings,
                            "windowHours": PATTERN_WINDOW_HOURS,
                        }),
                    },
                    &claim,
                )
                .await?;
            let Some(flag) = flag else {
                continue;
            };

            self.deps
                .sink
                .create_system_alert(NewSystemAlert::warning(
                    "Excessive Booking Activity",
                    format!("User {} made {} bookings in 24 hours", volume.user_id, volume.bookings),
                    json!({ "userId": volume.user_id, "bookingCount": volume.bookings }),
                ))
                .await;
            self.deps
                .sink
                .log_automated_action(NewAutomatedAction::succeeded(
                    MODULE,
                    "Suspicious pattern detection",
                    format!("Flagged user {} for excessive bookings", volume.user_id),
                    json!({ "userId": volume.user_id, "flagId": flag.id, "bookingCount": volume.bookings }),
                ))
                .await;
            summary.excessive_bookers_flagged += 1;
        }

        let response_stats = self.deps.store.list_response_stats(since).await?;
        for stats in response_stats.into_iter().filter(|s| {
            s.responses >= MIN_RESPONSES_FOR_AUTOMATION_CHECK
                && s.avg_response_secs < AUTOMATED_RESPONSE_SECS
        }) {
            let claim = DedupClaim::for_window(
                format!("automated-responses:{}", stats.provider_id),
                window,
            );
            let flag = self
                .deps
                .store
                .insert_security_flag_once(
                    NewSecurityFlag {
                        subject: FlagSubject::Provider(stats.provider_id),
                        flag_type: FlagType::AutomatedResponses,
                        details: json!({
                            "responses": stats.responses,
                            "avgResponseSecs": stats.avg_response_secs,
                        }),
                    },
                    &claim,
                )
                .await?;
            let Some(flag) = flag else {
                continue;
            };

            self.deps
                .sink
                .create_system_alert(NewSystemAlert::info(
                    "Suspiciously Fast Provider Responses",
                    format!(
                        "Provider {} averaging {:.1}s response time",
                        stats.provider_id, stats.avg_response_secs
                    ),
                    json!({
                        "providerId": stats.provider_id,
                        "responses": stats.responses,
                        "avgResponseSecs": stats.avg_response_secs,
                    }),
                ))
                .await;
            self.deps
                .sink
                .log_automated_action(NewAutomatedAction::succeeded(
                    MODULE,
                    "Suspicious pattern detection",
                    format!("Flagged provider {} for automated responses", stats.provider_id),
                    json!({ "providerId": stats.provider_id, "flagId": flag.id }),
                ))
                .await;
            summary.automated_responders_flagged += 1;
        }

        info!(
            excessive_bookers = summary.excessive_bookers_flagged,
            automated_responders = summary.automated_responders_flagged,
            "Suspicious pattern detection finished"
        );
        Ok(summary)
    }

    /// Dismisses low-priority flags nobody reviewed in time. Returns how
    /// many were dismissed.
    pub async fn auto_review_flags(&self) -> MonitorResult<usize> {
        let cutoff = Utc::now() - Duration::days(STALE_FLAG_DAYS);
        let dismissed = self
            .deps
            .store
            .dismiss_stale_flags(&FlagType::LOW_PRIORITY, cutoff)
            .await?;

        if !dismissed.is_empty() {
            self.deps
                .sink
                .log_automated_action(NewAutomatedAction::succeeded(
                    MODULE,
                    "Security flag auto-review",
                    format!("Auto-dismissed {} old low-priority security flags", dismissed.len()),
                    json!({ "flagIds": dismissed }),
                ))
                .await;
            info!(count = dismissed.len(), "Stale security flags dismissed");
        }
        Ok(dismissed.len())
    }
}
