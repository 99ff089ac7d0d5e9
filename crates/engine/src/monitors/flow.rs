//! Booking flow monitor: delayed bookings, low ratings and provider
//! cancellations.

use chrono::{Duration, Utc};
use domain::models::{
    AssignmentChange, Booking, BookingContext, BookingStatus, NewAutomatedAction,
    NewProviderWarning, NewSystemAlert, ProviderStatus, Review,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{MonitorDeps, MonitorError, MonitorResult};

pub const MODULE: &str = "ServiceFlow";

/// Minutes past the scheduled time after which an assigned booking is late.
pub const DELAY_THRESHOLD_MINUTES: i64 = 10;

/// Trailing window in which low ratings are counted.
pub const LOW_RATING_WINDOW_DAYS: i64 = 30;

/// Low ratings within the window that pause a provider.
pub const LOW_RATINGS_BEFORE_PAUSE: usize = 2;

/// Coins credited to a customer whose provider cancelled.
pub const CANCELLATION_CREDIT: i64 = 25;

/// A late booking without a replacement is reported at most this often.
const UNASSIGNABLE_ALERT_WINDOW_HOURS: i64 = 1;

/// Result of one delayed-booking sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayedBookingsSummary {
    pub examined: usize,
    pub reassigned: usize,
    pub unassignable: usize,
    /// Bookings changed by someone else between read and reassignment.
    pub skipped: usize,
}

/// A review as seen by the performance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewEvent {
    /// Stored review id, when the review was already persisted.
    pub review_id: Option<Uuid>,
    pub provider_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub rating: i16,
}

impl From<&Review> for ReviewEvent {
    fn from(review: &Review) -> Self {
        Self {
            review_id: Some(review.id),
            provider_id: review.provider_id,
            booking_id: Some(review.booking_id),
            rating: review.rating,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PerformanceOutcome {
    /// Rating was not low.
    Ignored,
    /// Low rating recorded, not enough to pause.
    Watching { low_ratings: usize },
    Paused { low_ratings: usize },
    /// Provider was already paused; nothing new was issued.
    AlreadyPaused { low_ratings: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CancellationOutcome {
    Reassigned {
        booking_id: Uuid,
        provider_id: Uuid,
        credited: i64,
    },
    /// Booking is back in the pending pool without a provider.
    Released { booking_id: Uuid, credited: i64 },
    /// The booking had no provider left to release.
    AlreadyHandled { booking_id: Uuid },
}

pub struct FlowMonitor {
    deps: MonitorDeps,
}

impl FlowMonitor {
    pub fn new(deps: MonitorDeps) -> Self {
        Self { deps }
    }

    /// Reassigns assigned bookings that are running late.
    pub async fn handle_delayed_bookings(&self) -> MonitorResult<DelayedBookingsSummary> {
        let now = Utc::now();
        let overdue = self
            .deps
            .store
            .list_overdue_assigned(now - Duration::minutes(DELAY_THRESHOLD_MINUTES))
            .await?;

        let mut summary = DelayedBookingsSummary {
            examined: overdue.len(),
            ..Default::default()
        };

        for ctx in overdue {
            let delay_minutes = ctx.booking.delay_minutes(now).unwrap_or_default();
            let current = ctx.booking.provider_id;
            let candidates = self
                .deps
                .store
                .find_replacement_candidates(&ctx.category, &ctx.city, current)
                .await?;

            let Some(replacement) = candidates.into_iter().next() else {
                self.report_unassignable(&ctx).await;
                summary.unassignable += 1;
                continue;
            };

            let change = AssignmentChange::reassign(&ctx.booking, replacement.id);
            if self.deps.store.apply_assignment(&change).await?.is_none() {
                debug!(booking_id = %ctx.booking.id, "Booking changed concurrently, skipping");
                summary.skipped += 1;
                continue;
            }

            let old_name = match current {
                Some(id) => self.deps.store.get_provider(id).await?.map(|p| p.name),
                None => None,
            };
            let old_label = old_name.unwrap_or_else(|| "unassigned".to_string());
            let old_id = current.map(|id| id.to_string()).unwrap_or_default();

            self.deps
                .sink
                .create_system_alert(NewSystemAlert::info(
                    "Booking Auto-Reassigned",
                    format!(
                        "Booking {} was delayed and reassigned from {} to {}",
                        ctx.booking.id, old_label, replacement.name
                    ),
                    json!({
                        "bookingId": ctx.booking.id,
                        "oldProviderId": current,
                        "newProviderId": replacement.id,
                        "delayMinutes": delay_minutes,
                    }),
                ))
                .await;

            self.deps
                .sink
                .log_automated_action(NewAutomatedAction::succeeded(
                    MODULE,
                    "Booking delayed > 10 min",
                    format!(
                        "Reassigned booking {} from provider {} to {}",
                        ctx.booking.id, old_id, replacement.id
                    ),
                    json!({
                        "bookingId": ctx.booking.id,
                        "oldProviderId": current,
                        "newProviderId": replacement.id,
                        "delayMinutes": delay_minutes,
                    }),
                ))
                .await;

            self.deps
                .notify_user(
                    ctx.booking.user_id,
                    &format!(
                        "Your {} booking is running late, so we have assigned {} to take care of it.",
                        ctx.service_name, replacement.name
                    ),
                )
                .await;

            info!(
                booking_id = %ctx.booking.id,
                new_provider_id = %replacement.id,
                delay_minutes,
                "Delayed booking reassigned"
            );
            summary.reassigned += 1;
        }

        Ok(summary)
    }

    async fn report_unassignable(&self, ctx: &BookingContext) {
        let alert = self
            .deps
            .sink
            .create_system_alert_once(
                NewSystemAlert::warning(
                    "No Alternative Provider Found",
                    format!(
                        "Could not reassign delayed booking {} - no available providers",
                        ctx.booking.id
                    ),
                    json!({
                        "bookingId": ctx.booking.id,
                        "originalProviderId": ctx.booking.provider_id,
                        "serviceCategory": ctx.category,
                        "city": ctx.city,
                    }),
                ),
                format!("no-alternative:{}", ctx.booking.id),
                Duration::hours(UNASSIGNABLE_ALERT_WINDOW_HOURS),
            )
            .await;

        if alert.is_some() {
            self.deps
                .sink
                .log_automated_action(NewAutomatedAction::succeeded(
                    MODULE,
                    "Booking delayed > 10 min",
                    format!("No replacement provider available for booking {}", ctx.booking.id),
                    json!({
                        "bookingId": ctx.booking.id,
                        "serviceCategory": ctx.category,
                        "city": ctx.city,
                    }),
                ))
                .await;
        }
        warn!(booking_id = %ctx.booking.id, city = %ctx.city, "No replacement provider for delayed booking");
    }

    /// Pauses a provider on the second low rating within the window.
    pub async fn monitor_provider_performance(
        &self,
        review: ReviewEvent,
    ) -> MonitorResult<PerformanceOutcome> {
        if review.rating >= domain::models::LOW_RATING_THRESHOLD {
            return Ok(PerformanceOutcome::Ignored);
        }

        let provider = self
            .deps
            .store
            .get_provider(review.provider_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("provider {}", review.provider_id)))?;

        let since = Utc::now() - Duration::days(LOW_RATING_WINDOW_DAYS);
        let recent = self
            .deps
            .store
            .list_low_reviews(review.provider_id, since)
            .await?;

        let stored = review
            .review_id
            .is_some_and(|id| recent.iter().any(|r| r.id == id));
        let low_ratings = if stored { recent.len() } else { recent.len() + 1 };

        if low_ratings < LOW_RATINGS_BEFORE_PAUSE {
            debug!(provider_id = %provider.id, low_ratings, "Low rating recorded");
            return Ok(PerformanceOutcome::Watching { low_ratings });
        }
        if provider.status == ProviderStatus::Paused {
            return Ok(PerformanceOutcome::AlreadyPaused { low_ratings });
        }

        let mut history: Vec<_> = recent
            .iter()
            .map(|r| json!({ "rating": r.rating, "date": r.created_at }))
            .collect();
        if !stored {
            history.push(json!({ "rating": review.rating, "date": Utc::now() }));
        }

        self.deps
            .store
            .pause_provider_with_warning(NewProviderWarning {
                provider_id: provider.id,
                reason: "Multiple low ratings within 30 days".to_string(),
                details: json!({
                    "lowRatingCount": low_ratings,
                    "recentRatings": history,
                }),
            })
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("provider {}", provider.id)))?;

        self.deps
            .sink
            .create_system_alert(NewSystemAlert::warning(
                "Provider Account Paused",
                format!(
                    "Provider {} paused due to {} low ratings in 30 days",
                    provider.id, low_ratings
                ),
                json!({
                    "providerId": provider.id,
                    "lowRatingCount": low_ratings,
                    "triggerRating": review.rating,
                    "bookingId": review.booking_id,
                }),
            ))
            .await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Provider rated below 3 stars twice",
                format!("Paused provider {} and issued warning", provider.id),
                json!({ "providerId": provider.id, "lowRatingCount": low_ratings }),
            ))
            .await;

        info!(provider_id = %provider.id, low_ratings, "Provider paused for low ratings");
        Ok(PerformanceOutcome::Paused { low_ratings })
    }

    /// Compensates the customer of a provider-cancelled booking and tries to
    /// put a new provider on it straight away.
    pub async fn handle_provider_cancellation(
        &self,
        booking_id: Uuid,
    ) -> MonitorResult<CancellationOutcome> {
        let ctx = self
            .deps
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("booking {}", booking_id)))?;

        if !needs_release(&ctx.booking) {
            return Ok(CancellationOutcome::AlreadyHandled { booking_id });
        }

        let Some(released) = self
            .deps
            .store
            .apply_assignment(&AssignmentChange::release(&ctx.booking))
            .await?
        else {
            debug!(booking_id = %booking_id, "Cancellation already handled concurrently");
            return Ok(CancellationOutcome::AlreadyHandled { booking_id });
        };

        self.deps
            .store
            .credit_coins(ctx.booking.user_id, CANCELLATION_CREDIT)
            .await?;

        let candidates = self
            .deps
            .store
            .find_replacement_candidates(&ctx.category, &ctx.city, None)
            .await?;
        let mut new_provider = None;
        if let Some(candidate) = candidates.into_iter().next() {
            let change = AssignmentChange::reassign(&released, candidate.id);
            if self.deps.store.apply_assignment(&change).await?.is_some() {
                new_provider = Some(candidate);
            }
        }

        let outcome_text = if new_provider.is_some() {
            "assigned new provider"
        } else {
            "no replacement found"
        };
        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Booking canceled by provider",
                format!(
                    "Credited user Rs. {}, reset booking, {}",
                    CANCELLATION_CREDIT, outcome_text
                ),
                json!({
                    "bookingId": booking_id,
                    "userId": ctx.booking.user_id,
                    "creditAmount": CANCELLATION_CREDIT,
                    "newProviderId": new_provider.as_ref().map(|p| p.id),
                }),
            ))
            .await;

        let message = match &new_provider {
            Some(provider) => format!(
                "Sorry, your provider cancelled your {} booking. We have credited Rs. {} to your wallet and assigned {} instead.",
                ctx.service_name, CANCELLATION_CREDIT, provider.name
            ),
            None => format!(
                "Sorry, your provider cancelled your {} booking. We have credited Rs. {} to your wallet and are finding you a new provider.",
                ctx.service_name, CANCELLATION_CREDIT
            ),
        };
        self.deps.notify_user(ctx.booking.user_id, &message).await;

        info!(booking_id = %booking_id, outcome = outcome_text, "Provider cancellation handled");
        Ok(match new_provider {
            Some(provider) => CancellationOutcome::Reassigned {
                booking_id,
                provider_id: provider.id,
                credited: CANCELLATION_CREDIT,
            },
            None => CancellationOutcome::Released {
                booking_id,
                credited: CANCELLATION_CREDIT,
            },
        })
    }
}

/// A booking still holding a provider, or cancelled, has something to release.
fn needs_release(booking: &Booking) -> bool {
    booking.provider_id.is_some() || booking.status == BookingStatus::Cancelled
}
