//! PostgreSQL implementation of the data access facade.

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{
    ActionSummary, ActivePromotion, AlertSummary, AssignmentChange, AutomatedActionLog, Booking,
    BookingContext, BookingSummary, BookingVolume, FlagType, NewAutomatedAction, NewPromotion,
    NewProviderWarning, NewSecurityFlag, NewSystemAlert, NewWeeklyReport, OnboardingStats,
    PromotionType, Provider, ProviderActivity, ProviderSummary, ProviderWarning, Referral,
    ReferralBonus, ResponseStats, Review, ReviewSummary, SecurityFlag, ServiceArea, ServiceRequestLog,
    SystemAlert, User, UserSummary, WeeklyReport,
};
use domain::services::{
    AlertStore, BookingStore, DedupClaim, DedupStore, DemandStore, PromotionStore, ProviderStore,
    ReportStore, ReviewStore, SecurityFlagStore, StoreError, StoreHealth, StoreResult, UserStore,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::metrics::record_query_error;
use crate::repositories::{
    AlertRepository, BookingRepository, DedupRepository, DemandRepository, PromotionRepository,
    ProviderRepository, ReportRepository, ReviewRepository, SecurityFlagRepository,
    UserRepository,
};

/// Maps a sqlx error to a store error, counting it against `operation`.
fn store_err(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |err| {
        record_query_error(operation);
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(operation.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(db_err.to_string()),
                Some("23503") => StoreError::NotFound(db_err.to_string()),
                _ => StoreError::Database(format!("{}: {}", operation, db_err)),
            },
            other => StoreError::Database(format!("{}: {}", operation, other)),
        }
    }
}

/// Data access facade backed by PostgreSQL.
#[derive(Clone)]
pub struct PgMarketplaceStore {
    pool: PgPool,
    bookings: BookingRepository,
    providers: ProviderRepository,
    users: UserRepository,
    reviews: ReviewRepository,
    flags: SecurityFlagRepository,
    alerts: AlertRepository,
    promotions: PromotionRepository,
    demand: DemandRepository,
    reports: ReportRepository,
    dedup: DedupRepository,
}

impl PgMarketplaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            bookings: BookingRepository::new(pool.clone()),
            providers: ProviderRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            reviews: ReviewRepository::new(pool.clone()),
            flags: SecurityFlagRepository::new(pool.clone()),
            alerts: AlertRepository::new(pool.clone()),
            promotions: PromotionRepository::new(pool.clone()),
            demand: DemandRepository::new(pool.clone()),
            reports: ReportRepository::new(pool.clone()),
            dedup: DedupRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Deletes expired dedup claims. Returns how many were removed.
    pub async fn purge_expired_claims(&self) -> StoreResult<u64> {
        self.dedup
            .purge_expired(Utc::now())
            .await
            .map_err(store_err("purge_expired_claims"))
    }
}

#[async_trait::async_trait]
impl BookingStore for PgMarketplaceStore {
    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<BookingContext>> {
        self.bookings.find_context(id).await.map_err(store_err("get_booking"))
    }

    async fn list_overdue_assigned(
        &self,
        scheduled_before: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingContext>> {
        self.bookings
            .list_overdue_assigned(scheduled_before)
            .await
            .map_err(store_err("list_overdue_assigned"))
    }

    async fn apply_assignment(&self, change: &AssignmentChange) -> StoreResult<Option<Booking>> {
        self.bookings
            .apply_assignment(change)
            .await
            .map_err(store_err("apply_assignment"))
    }

    async fn count_bookings_for_user(&self, user_id: Uuid) -> StoreResult<i64> {
        self.bookings
            .count_for_user(user_id)
            .await
            .map_err(store_err("count_bookings_for_user"))
    }

    async fn list_high_volume_bookers(
        &self,
        since: DateTime<Utc>,
        more_than: i64,
    ) -> StoreResult<Vec<BookingVolume>> {
        self.bookings
            .list_high_volume_bookers(since, more_than)
            .await
            .map_err(store_err("list_high_volume_bookers"))
    }

    async fn list_response_stats(&self, since: DateTime<Utc>) -> StoreResult<Vec<ResponseStats>> {
        self.bookings
            .list_response_stats(since)
            .await
            .map_err(store_err("list_response_stats"))
    }

    async fn list_service_areas(&self) -> StoreResult<Vec<ServiceArea>> {
        self.bookings
            .list_service_areas()
            .await
            .map_err(store_err("list_service_areas"))
    }

    async fn list_service_cities(&self) -> StoreResult<Vec<String>> {
        self.bookings
            .list_service_cities()
            .await
            .map_err(store_err("list_service_cities"))
    }

    async fn count_bookings_in_area(
        &self,
        area: &ServiceArea,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.bookings
            .count_in_area(area, since)
            .await
            .map_err(store_err("count_bookings_in_area"))
    }

    async fn count_bookings_in_city(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.bookings
            .count_in_city(city, from, to)
            .await
            .map_err(store_err("count_bookings_in_city"))
    }

    async fn booking_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<BookingSummary> {
        self.bookings
            .summary(from, to)
            .await
            .map_err(store_err("booking_summary"))
    }
}

#[async_trait::async_trait]
impl ProviderStore for PgMarketplaceStore {
    async fn get_provider(&self, id: Uuid) -> StoreResult<Option<Provider>> {
        self.providers.find_by_id(id).await.map_err(store_err("get_provider"))
    }

    async fn find_replacement_candidates(
        &self,
        category: &str,
        city: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<Vec<Provider>> {
        self.providers
            .find_replacement_candidates(category, city, exclude)
            .await
            .map_err(store_err("find_replacement_candidates"))
    }

    async fn pause_provider_with_warning(
        &self,
        warning: NewProviderWarning,
    ) -> StoreResult<Option<ProviderWarning>> {
        self.providers
            .pause_with_warning(warning)
            .await
            .map_err(store_err("pause_provider_with_warning"))
    }

    async fn pause_provider_with_flag(
        &self,
        provider_id: Uuid,
        flag: NewSecurityFlag,
    ) -> StoreResult<Option<SecurityFlag>> {
        self.providers
            .pause_with_flag(provider_id, flag)
            .await
            .map_err(store_err("pause_provider_with_flag"))
    }

    async fn count_providers_covering(&self, area: &ServiceArea) -> StoreResult<i64> {
        self.providers
            .count_covering(area)
            .await
            .map_err(store_err("count_providers_covering"))
    }

    async fn count_available_providers(&self) -> StoreResult<i64> {
        self.providers
            .count_available()
            .await
            .map_err(store_err("count_available_providers"))
    }

    async fn onboarding_stats(
        &self,
        since: DateTime<Utc>,
        zone_limit: usize,
    ) -> StoreResult<OnboardingStats> {
        self.providers
            .onboarding_stats(since, zone_limit)
            .await
            .map_err(store_err("onboarding_stats"))
    }

    async fn list_provider_activity(
        &self,
        created_before: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ProviderActivity>> {
        self.providers
            .list_activity(created_before, since)
            .await
            .map_err(store_err("list_provider_activity"))
    }

    async fn provider_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ProviderSummary> {
        self.providers
            .summary(from, to)
            .await
            .map_err(store_err("provider_summary"))
    }
}

#[async_trait::async_trait]
impl UserStore for PgMarketplaceStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.users.find_by_id(id).await.map_err(store_err("get_user"))
    }

    async fn find_users_by_phone(&self, phone: &str, exclude: Uuid) -> StoreResult<Vec<User>> {
        let normalized = shared::validation::normalize_phone(phone);
        self.users
            .find_by_phone(&normalized, exclude)
            .await
            .map_err(store_err("find_users_by_phone"))
    }

    async fn credit_coins(&self, user_id: Uuid, amount: i64) -> StoreResult<i64> {
        self.users
            .credit_coins(user_id, amount)
            .await
            .map_err(store_err("credit_coins"))?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }

    async fn list_inactive_users(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<User>> {
        self.users
            .list_inactive(cutoff)
            .await
            .map_err(store_err("list_inactive_users"))
    }

    async fn user_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<UserSummary> {
        self.users.summary(from, to).await.map_err(store_err("user_summary"))
    }

    async fn get_referral(&self, id: Uuid) -> StoreResult<Option<Referral>> {
        self.users.find_referral(id).await.map_err(store_err("get_referral"))
    }

    async fn find_unredeemed_referral(&self, user_id: Uuid) -> StoreResult<Option<Referral>> {
        self.users
            .find_unredeemed_referral(user_id)
            .await
            .map_err(store_err("find_unredeemed_referral"))
    }

    async fn settle_referral(
        &self,
        id: Uuid,
        bonus: ReferralBonus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Referral>> {
        self.users
            .settle_referral(id, bonus, at)
            .await
            .map_err(store_err("settle_referral"))
    }
}

#[async_trait::async_trait]
impl ReviewStore for PgMarketplaceStore {
    async fn list_low_reviews(
        &self,
        provider_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Review>> {
        self.reviews
            .list_low_for_provider(provider_id, since)
            .await
            .map_err(store_err("list_low_reviews"))
    }

    async fn review_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ReviewSummary> {
        self.reviews
            .summary(from, to)
            .await
            .map_err(store_err("review_summary"))
    }
}

#[async_trait::async_trait]
impl SecurityFlagStore for PgMarketplaceStore {
    async fn insert_security_flag(&self, flag: NewSecurityFlag) -> StoreResult<SecurityFlag> {
        self.flags
            .insert(flag)
            .await
            .map_err(store_err("insert_security_flag"))
    }

    async fn insert_security_flag_once(
        &self,
        flag: NewSecurityFlag,
        claim: &DedupClaim,
    ) -> StoreResult<Option<SecurityFlag>> {
        self.flags
            .insert_once(flag, claim)
            .await
            .map_err(store_err("insert_security_flag_once"))
    }

    async fn dismiss_stale_flags(
        &self,
        types: &[FlagType],
        created_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>> {
        self.flags
            .dismiss_stale(types, created_before)
            .await
            .map_err(store_err("dismiss_stale_flags"))
    }

    async fn count_security_flags(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.flags
            .count_created(from, to)
            .await
            .map_err(store_err("count_security_flags"))
    }
}

#[async_trait::async_trait]
impl AlertStore for PgMarketplaceStore {
    async fn insert_alert(&self, alert: NewSystemAlert) -> StoreResult<SystemAlert> {
        self.alerts
            .insert_alert(alert)
            .await
            .map_err(store_err("insert_alert"))
    }

    async fn insert_alert_once(
        &self,
        alert: NewSystemAlert,
        claim: &DedupClaim,
    ) -> StoreResult<Option<SystemAlert>> {
        self.alerts
            .insert_alert_once(alert, claim)
            .await
            .map_err(store_err("insert_alert_once"))
    }

    async fn insert_action(&self, action: NewAutomatedAction) -> StoreResult<AutomatedActionLog> {
        self.alerts
            .insert_action(action)
            .await
            .map_err(store_err("insert_action"))
    }

    async fn list_recent_alerts(&self, limit: i64) -> StoreResult<Vec<SystemAlert>> {
        self.alerts
            .list_recent(limit)
            .await
            .map_err(store_err("list_recent_alerts"))
    }

    async fn alert_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<AlertSummary> {
        self.alerts
            .alert_summary(from, to)
            .await
            .map_err(store_err("alert_summary"))
    }

    async fn action_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ActionSummary> {
        self.alerts
            .action_summary(from, to)
            .await
            .map_err(store_err("action_summary"))
    }
}

#[async_trait::async_trait]
impl PromotionStore for PgMarketplaceStore {
    async fn insert_promotion_once(
        &self,
        promotion: NewPromotion,
    ) -> StoreResult<Option<ActivePromotion>> {
        self.promotions
            .insert_once(promotion)
            .await
            .map_err(store_err("insert_promotion_once"))
    }

    async fn find_active_promotion(
        &self,
        promotion_type: PromotionType,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ActivePromotion>> {
        self.promotions
            .find_active(promotion_type, at)
            .await
            .map_err(store_err("find_active_promotion"))
    }
}

#[async_trait::async_trait]
impl DemandStore for PgMarketplaceStore {
    async fn record_service_request(
        &self,
        search_term: &str,
        city: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<ServiceRequestLog> {
        self.demand
            .record(search_term, city, at)
            .await
            .map_err(store_err("record_service_request"))
    }

    async fn list_service_requests(
        &self,
        since: DateTime<Utc>,
        min_count: i64,
    ) -> StoreResult<Vec<ServiceRequestLog>> {
        self.demand
            .list_since(since, min_count)
            .await
            .map_err(store_err("list_service_requests"))
    }
}

#[async_trait::async_trait]
impl ReportStore for PgMarketplaceStore {
    async fn find_weekly_report(
        &self,
        week_ending: NaiveDate,
    ) -> StoreResult<Option<WeeklyReport>> {
        self.reports
            .find_by_week(week_ending)
            .await
            .map_err(store_err("find_weekly_report"))
    }

    async fn insert_weekly_report(
        &self,
        report: NewWeeklyReport,
    ) -> StoreResult<Option<WeeklyReport>> {
        self.reports
            .insert_if_absent(report)
            .await
            .map_err(store_err("insert_weekly_report"))
    }
}

#[async_trait::async_trait]
impl DedupStore for PgMarketplaceStore {
    async fn claim(&self, claim: &DedupClaim) -> StoreResult<bool> {
        self.dedup
            .claim(&claim.key, claim.expires_at)
            .await
            .map_err(store_err("claim"))
    }
}

#[async_trait::async_trait]
impl StoreHealth for PgMarketplaceStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_err("ping"))
    }
}
