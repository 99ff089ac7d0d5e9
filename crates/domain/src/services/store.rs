//! Data access facade used by the monitors.
//!
//! The traits are grouped per aggregate. Anything implementing all of them
//! is a [`MarketplaceStore`]. Guarantees that must hold under concurrent
//! monitor runs (dedup windows, compare-and-set assignment, single
//! redemption of referrals, one report per week) are part of the contract
//! and must be enforced by the implementation, not by callers.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ActionSummary, ActivePromotion, AlertSummary, AssignmentChange, AutomatedActionLog, Booking,
    BookingContext, BookingSummary, BookingVolume, FlagType, NewAutomatedAction, NewPromotion,
    NewProviderWarning, NewSecurityFlag, NewSystemAlert, NewWeeklyReport, OnboardingStats,
    PromotionType, Provider, ProviderActivity, ProviderSummary, ProviderWarning, Referral,
    ReferralBonus, ResponseStats, Review, ReviewSummary, SecurityFlag, ServiceArea, ServiceRequestLog,
    SystemAlert, User, UserSummary, WeeklyReport,
};

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A claim on a dedup key until `expires_at`.
///
/// A claim succeeds only when the key is unclaimed or its previous claim
/// has expired. The claim and the write it guards are applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupClaim {
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

impl DedupClaim {
    /// Claim `key` for `window` starting now.
    pub fn for_window(key: impl Into<String>, window: Duration) -> Self {
        Self {
            key: key.into(),
            expires_at: Utc::now() + window,
        }
    }

    /// Claim `key` until a fixed instant.
    pub fn until(key: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            expires_at,
        }
    }
}

#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    /// Booking with its service city and category.
    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<BookingContext>>;

    /// ASSIGNED bookings with a provider, scheduled before the cutoff.
    async fn list_overdue_assigned(
        &self,
        scheduled_before: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingContext>>;

    /// Compare-and-set assignment change. `None` when the booking no longer
    /// matches the expected status and provider.
    async fn apply_assignment(&self, change: &AssignmentChange) -> StoreResult<Option<Booking>>;

    /// All-time bookings made by a user.
    async fn count_bookings_for_user(&self, user_id: Uuid) -> StoreResult<i64>;

    /// Users with more than `more_than` bookings created since the cutoff.
    async fn list_high_volume_bookers(
        &self,
        since: DateTime<Utc>,
        more_than: i64,
    ) -> StoreResult<Vec<BookingVolume>>;

    /// Per-provider acceptance latency for bookings accepted since the cutoff.
    async fn list_response_stats(&self, since: DateTime<Utc>) -> StoreResult<Vec<ResponseStats>>;

    /// Distinct (city, category) pairs with at least one active service.
    async fn list_service_areas(&self) -> StoreResult<Vec<ServiceArea>>;

    /// Distinct cities with at least one active service.
    async fn list_service_cities(&self) -> StoreResult<Vec<String>>;

    async fn count_bookings_in_area(
        &self,
        area: &ServiceArea,
        since: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Bookings for services in `city` created in `[from, to)`.
    async fn count_bookings_in_city(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Aggregates for bookings created in `[from, to)`.
    async fn booking_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<BookingSummary>;
}

#[async_trait::async_trait]
pub trait ProviderStore: Send + Sync {
    async fn get_provider(&self, id: Uuid) -> StoreResult<Option<Provider>>;

    /// ACTIVE, online providers covering the category and city, best first.
    async fn find_replacement_candidates(
        &self,
        category: &str,
        city: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<Vec<Provider>>;

    /// Pauses the provider and records the warning in one transaction.
    /// `None` when the provider does not exist; nothing is written then.
    async fn pause_provider_with_warning(
        &self,
        warning: NewProviderWarning,
    ) -> StoreResult<Option<ProviderWarning>>;

    /// Pauses the provider and records the security flag against it in one
    /// transaction. `None` when the provider does not exist.
    async fn pause_provider_with_flag(
        &self,
        provider_id: Uuid,
        flag: NewSecurityFlag,
    ) -> StoreResult<Option<SecurityFlag>>;

    /// ACTIVE providers with the category skill and city zone.
    async fn count_providers_covering(&self, area: &ServiceArea) -> StoreResult<i64>;

    /// ACTIVE providers currently online.
    async fn count_available_providers(&self) -> StoreResult<i64>;

    /// Signup figures for providers created since the cutoff.
    async fn onboarding_stats(
        &self,
        since: DateTime<Utc>,
        zone_limit: usize,
    ) -> StoreResult<OnboardingStats>;

    /// ACTIVE verified providers created before `created_before`, with their
    /// bookings since `since`.
    async fn list_provider_activity(
        &self,
        created_before: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ProviderActivity>>;

    async fn provider_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ProviderSummary>;
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Other users registered with the same normalized phone number.
    async fn find_users_by_phone(&self, phone: &str, exclude: Uuid) -> StoreResult<Vec<User>>;

    /// Adds coins to a wallet and returns the new balance.
    async fn credit_coins(&self, user_id: Uuid, amount: i64) -> StoreResult<i64>;

    /// Users that are not shadow-banned, have at least one booking and have
    /// been inactive since the cutoff.
    async fn list_inactive_users(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<User>>;

    async fn user_summary(&self, from: DateTime<Utc>, to: DateTime<Utc>)
        -> StoreResult<UserSummary>;

    async fn get_referral(&self, id: Uuid) -> StoreResult<Option<Referral>>;

    /// Unredeemed referral whose referred user is `user_id`.
    async fn find_unredeemed_referral(&self, user_id: Uuid) -> StoreResult<Option<Referral>>;

    /// Marks a referral redeemed and credits both wallets, all or nothing.
    /// `None` when the referral is already redeemed. A missing wallet fails
    /// the whole settlement and leaves the referral unredeemed.
    async fn settle_referral(
        &self,
        id: Uuid,
        bonus: ReferralBonus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Referral>>;
}

#[async_trait::async_trait]
pub trait ReviewStore: Send + Sync {
    /// Reviews rated below 3 for a provider since the cutoff, oldest first.
    async fn list_low_reviews(
        &self,
        provider_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Review>>;

    async fn review_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ReviewSummary>;
}

#[async_trait::async_trait]
pub trait SecurityFlagStore: Send + Sync {
    async fn insert_security_flag(&self, flag: NewSecurityFlag) -> StoreResult<SecurityFlag>;

    /// Inserts the flag only if the dedup claim succeeds.
    async fn insert_security_flag_once(
        &self,
        flag: NewSecurityFlag,
        claim: &DedupClaim,
    ) -> StoreResult<Option<SecurityFlag>>;

    /// Dismisses PENDING_REVIEW flags of the given types created before the
    /// cutoff. Returns the ids dismissed.
    async fn dismiss_stale_flags(
        &self,
        types: &[FlagType],
        created_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>>;

    async fn count_security_flags(&self, from: DateTime<Utc>, to: DateTime<Utc>)
        -> StoreResult<i64>;
}

#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, alert: NewSystemAlert) -> StoreResult<SystemAlert>;

    /// Inserts the alert only if the dedup claim succeeds.
    async fn insert_alert_once(
        &self,
        alert: NewSystemAlert,
        claim: &DedupClaim,
    ) -> StoreResult<Option<SystemAlert>>;

    async fn insert_action(&self, action: NewAutomatedAction) -> StoreResult<AutomatedActionLog>;

    /// Newest first.
    async fn list_recent_alerts(&self, limit: i64) -> StoreResult<Vec<SystemAlert>>;

    async fn alert_summary(&self, from: DateTime<Utc>, to: DateTime<Utc>)
        -> StoreResult<AlertSummary>;

    async fn action_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ActionSummary>;
}

#[async_trait::async_trait]
pub trait PromotionStore: Send + Sync {
    /// Creates the promotion unless an unexpired one of the same type and
    /// city exists.
    async fn insert_promotion_once(
        &self,
        promotion: NewPromotion,
    ) -> StoreResult<Option<ActivePromotion>>;

    /// Most recently created unexpired promotion of the type.
    async fn find_active_promotion(
        &self,
        promotion_type: PromotionType,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ActivePromotion>>;
}

#[async_trait::async_trait]
pub trait DemandStore: Send + Sync {
    /// Upserts the (term, city) counter and bumps it by one.
    async fn record_service_request(
        &self,
        search_term: &str,
        city: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<ServiceRequestLog>;

    /// Logs searched since the cutoff with at least `min_count` searches,
    /// highest count first.
    async fn list_service_requests(
        &self,
        since: DateTime<Utc>,
        min_count: i64,
    ) -> StoreResult<Vec<ServiceRequestLog>>;
}

#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    async fn find_weekly_report(&self, week_ending: NaiveDate)
        -> StoreResult<Option<WeeklyReport>>;

    /// Stores the report unless one exists for the week. `None` when it did.
    async fn insert_weekly_report(
        &self,
        report: NewWeeklyReport,
    ) -> StoreResult<Option<WeeklyReport>>;
}

#[async_trait::async_trait]
pub trait DedupStore: Send + Sync {
    /// Claims a dedup key on its own. True when the claim succeeded.
    async fn claim(&self, claim: &DedupClaim) -> StoreResult<bool>;
}

#[async_trait::async_trait]
pub trait StoreHealth: Send + Sync {
    /// Cheap round-trip to the backing store.
    async fn ping(&self) -> StoreResult<()>;
}

/// Everything the operations engine needs from storage.
pub trait MarketplaceStore:
    BookingStore
    + ProviderStore
    + UserStore
    + ReviewStore
    + SecurityFlagStore
    + AlertStore
    + PromotionStore
    + DemandStore
    + ReportStore
    + DedupStore
    + StoreHealth
    + 'static
{
}

impl<T> MarketplaceStore for T where
    T: BookingStore
        + ProviderStore
        + UserStore
        + ReviewStore
        + SecurityFlagStore
        + AlertStore
        + PromotionStore
        + DemandStore
        + ReportStore
        + DedupStore
        + StoreHealth
        + 'static
{
}
