//! Growth monitor: city referral boosters, welcome bonuses, win-back
//! messages and referral payouts.

use std::num::NonZeroU32;

use chrono::{Duration, Utc};
use domain::models::{NewAutomatedAction, NewPromotion, NewSystemAlert, PromotionType, ReferralBonus};
use domain::services::DedupClaim;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};
use serde::Serialize;
use serde_json::json;
use shared::codes::generate_welcome_coupon;
use tracing::{debug, info};
use uuid::Uuid;

use super::{MonitorDeps, MonitorResult};

pub const MODULE: &str = "SmartReferrals";

/// Coins credited to every new user.
pub const WELCOME_BONUS: i64 = 50;

/// Days without activity after which a user is invited back.
pub const INACTIVITY_DAYS: i64 = 7;

/// A user receives at most one win-back message in this many days.
pub const REENGAGEMENT_COOLDOWN_DAYS: i64 = 3;

pub const COMEBACK_CODE: &str = "COMEBACK20";

/// Week-over-week booking drop that triggers a referral booster.
pub const ACTIVITY_DROP_PERCENT: f64 = 30.0;

/// Previous-week bookings a city needs before its drop is meaningful.
pub const MIN_PREVIOUS_BOOKINGS: i64 = 5;

/// Lifetime of an automatically created booster.
pub const BOOSTER_DURATION_HOURS: i64 = 48;

const REENGAGEMENT_MESSAGE: &str = "👋 We miss you at SewaGo! It's been a while since your last service. Come back and enjoy 20% off your next booking with code COMEBACK20. What service can we help you with today?";

type SendLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityActivity {
    pub city: String,
    pub recent_bookings: i64,
    pub previous_bookings: i64,
    pub drop_percentage: f64,
    pub booster_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeOutcome {
    pub user_id: Uuid,
    pub coupon_code: String,
    pub message_sent: bool,
    pub balance: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReengagementSummary {
    pub inactive_users: usize,
    pub messaged: usize,
    /// Users still inside their cooldown window.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ReferralOutcome {
    Rewarded {
        referral_id: Uuid,
        referrer_id: Uuid,
        referred_id: Uuid,
        bonus: ReferralBonus,
    },
    /// Unknown referral, or nobody has been referred yet.
    NotEligible { referral_id: Uuid },
    AlreadyRedeemed { referral_id: Uuid },
}

pub struct GrowthMonitor {
    deps: MonitorDeps,
    limiter: SendLimiter,
}

impl GrowthMonitor {
    /// `sends_per_second` bounds bulk outbound messaging; zero is treated
    /// as one.
    pub fn new(deps: MonitorDeps, sends_per_second: u32) -> Self {
        let rate = NonZeroU32::new(sends_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            deps,
            limiter: GovRateLimiter::direct(Quota::per_second(rate)),
        }
    }

    /// Creates a referral booster in every city whose bookings dropped
    /// sharply week over week.
    pub async fn analyze_city_activity(&self) -> MonitorResult<Vec<CityActivity>> {
        let now = Utc::now();
        let week_ago = now - Duration::days(7);
        let two_weeks_ago = now - Duration::days(14);
        let cities = self.deps.store.list_service_cities().await?;

        let mut results = Vec::with_capacity(cities.len());
        for city in cities {
            let recent = self
                .deps
                .store
                .count_bookings_in_city(&city, week_ago, now)
                .await?;
            let previous = self
                .deps
                .store
                .count_bookings_in_city(&city, two_weeks_ago, week_ago)
                .await?;
            let drop = activity_drop(previous, recent);

            let mut booster_created = false;
            if previous >= MIN_PREVIOUS_BOOKINGS && drop >= ACTIVITY_DROP_PERCENT {
                booster_created = self.create_booster(&city, previous, recent, drop).await?;
            }

            results.push(CityActivity {
                city,
                recent_bookings: recent,
                previous_bookings: previous,
                drop_percentage: drop,
                booster_created,
            });
        }

        Ok(results)
    }

    async fn create_booster(
        &self,
        city: &str,
        previous: i64,
        recent: i64,
        drop: f64,
    ) -> MonitorResult<bool> {
        let now = Utc::now();
        let bonus = ReferralBonus::default();
        let promotion = NewPromotion {
            name: format!("{} Referral Booster {}", city, now.format("%Y-%m-%d")),
            promotion_type: PromotionType::ReferralBooster,
            city: city.to_string(),
            details: json!({
                "bonusAmount": bonus.referred,
                "referrerBonus": bonus.referrer,
                "description": "Limited time referral bonus due to low activity",
                "trigger": "low_city_activity",
                "dropPercentage": drop,
                "previousBookings": previous,
                "recentBookings": recent,
            }),
            expires_at: now + Duration::hours(BOOSTER_DURATION_HOURS),
        };

        let Some(created) = self.deps.store.insert_promotion_once(promotion).await? else {
            debug!(city = %city, "Referral booster already active");
            return Ok(false);
        };

        self.deps
            .sink
            .create_system_alert(NewSystemAlert::info(
                "Referral Booster Created",
                format!(
                    "Created referral booster for {} due to {:.1}% activity drop",
                    city, drop
                ),
                json!({
                    "city": city,
                    "promotionId": created.id,
                    "dropPercentage": drop,
                    "previousBookings": previous,
                    "recentBookings": recent,
                }),
            ))
            .await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "City activity drops",
                format!("Created referral booster promotion for {}", city),
                json!({
                    "city": city,
                    "promotionId": created.id,
                    "dropPercentage": drop,
                    "expiresAt": created.expires_at,
                }),
            ))
            .await;

        info!(city = %city, drop_percentage = drop, "Referral booster created");
        Ok(true)
    }

    /// Greets a new user with a coupon and credits the welcome bonus.
    pub async fn send_welcome_message(
        &self,
        user_id: Uuid,
        phone: &str,
    ) -> MonitorResult<WelcomeOutcome> {
        let coupon_code = generate_welcome_coupon();
        let message = format!(
            "🎉 Welcome to SewaGo! Your Rs. {} welcome bonus is ready. Use code: {} on your first booking. Start exploring our services now!",
            WELCOME_BONUS, coupon_code
        );

        let balance = self.deps.store.credit_coins(user_id, WELCOME_BONUS).await?;
        let message_sent = self.deps.notify(phone, &message).await;

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "New user sign-up",
                format!("Sent welcome message with Rs. {} bonus", WELCOME_BONUS),
                json!({
                    "userId": user_id,
                    "couponCode": coupon_code,
                    "bonusAmount": WELCOME_BONUS,
                    "messageSent": message_sent,
                }),
            ))
            .await;

        Ok(WelcomeOutcome {
            user_id,
            coupon_code,
            message_sent,
            balance,
        })
    }

    /// Invites back users that have gone quiet, at most once per cooldown.
    pub async fn reengage_inactive_users(&self) -> MonitorResult<ReengagementSummary> {
        let now = Utc::now();
        let inactive = self
            .deps
            .store
            .list_inactive_users(now - Duration::days(INACTIVITY_DAYS))
            .await?;

        let mut summary = ReengagementSummary {
            inactive_users: inactive.len(),
            ..Default::default()
        };

        for user in inactive {
            let claim = DedupClaim::for_window(
                format!("reengagement:{}", user.id),
                Duration::days(REENGAGEMENT_COOLDOWN_DAYS),
            );
            if !self.deps.store.claim(&claim).await? {
                summary.skipped += 1;
                continue;
            }

            self.limiter.until_ready().await;
            let sent = self.deps.notify(&user.phone, REENGAGEMENT_MESSAGE).await;
            let days_since = (now - user.last_seen.unwrap_or(user.created_at)).num_days();

            self.deps
                .sink
                .log_automated_action(NewAutomatedAction::succeeded(
                    MODULE,
                    "Inactive user 7+ days",
                    "Sent re-engagement message with 20% discount",
                    json!({
                        "userId": user.id,
                        "daysSinceLastSeen": days_since,
                        "discountCode": COMEBACK_CODE,
                        "messageSent": sent,
                    }),
                ))
                .await;
            summary.messaged += 1;
        }

        info!(
            inactive = summary.inactive_users,
            messaged = summary.messaged,
            skipped = summary.skipped,
            "Inactive user re-engagement finished"
        );
        Ok(summary)
    }

    /// Pays out a referral once its referred user completes a booking.
    pub async fn process_referral_reward(
        &self,
        referral_id: Uuid,
        booking_amount: i64,
    ) -> MonitorResult<ReferralOutcome> {
        let Some(referral) = self.deps.store.get_referral(referral_id).await? else {
            return Ok(ReferralOutcome::NotEligible { referral_id });
        };
        let Some(referred_id) = referral.referred_id else {
            return Ok(ReferralOutcome::NotEligible { referral_id });
        };
        if referral.is_redeemed() {
            return Ok(ReferralOutcome::AlreadyRedeemed { referral_id });
        }

        let now = Utc::now();
        let promotion = self
            .deps
            .store
            .find_active_promotion(PromotionType::ReferralBooster, now)
            .await?;
        let bonus = promotion
            .as_ref()
            .map(|p| p.referral_bonus())
            .unwrap_or_default();

        if self
            .deps
            .store
            .settle_referral(referral_id, bonus, now)
            .await?
            .is_none()
        {
            debug!(referral_id = %referral_id, "Referral redeemed concurrently");
            return Ok(ReferralOutcome::AlreadyRedeemed { referral_id });
        }

        self.deps
            .sink
            .log_automated_action(NewAutomatedAction::succeeded(
                MODULE,
                "Successful referral booking",
                format!(
                    "Rewarded referrer Rs. {} and referred Rs. {}",
                    bonus.referrer, bonus.referred
                ),
                json!({
                    "referralId": referral_id,
                    "referrerId": referral.referrer_id,
                    "referredId": referred_id,
                    "referrerReward": bonus.referrer,
                    "referredReward": bonus.referred,
                    "bookingAmount": booking_amount,
                    "promotionId": promotion.map(|p| p.id),
                }),
            ))
            .await;

        Ok(ReferralOutcome::Rewarded {
            referral_id,
            referrer_id: referral.referrer_id,
            referred_id,
            bonus,
        })
    }

    /// Settles the pending referral of a user that just completed a booking.
    pub async fn settle_referral_for_user(
        &self,
        user_id: Uuid,
        booking_amount: i64,
    ) -> MonitorResult<Option<ReferralOutcome>> {
        match self.deps.store.find_unredeemed_referral(user_id).await? {
            Some(referral) => Ok(Some(
                self.process_referral_reward(referral.id, booking_amount)
                    .await?,
            )),
            None => Ok(None),
        }
    }
}

/// Week-over-week drop in percent; zero without a previous week.
fn activity_drop(previous: i64, recent: i64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (previous - recent) as f64 / previous as f64 * 100.0
}
