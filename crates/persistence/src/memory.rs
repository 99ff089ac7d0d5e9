//! In-memory implementation of the data access facade.
//!
//! Mirrors the guarantees of [`crate::PgMarketplaceStore`]: dedup claims,
//! assignment compare-and-set, referral settlement and provider pauses all
//! happen under a single write lock. Used by the test suites and by `--dry-run`.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{
    ActionSummary, ActivePromotion, AlertStatus, AlertSummary, AssignmentChange,
    AutomatedActionLog, Booking, BookingContext, BookingStatus, BookingSummary, BookingVolume,
    FlagStatus, FlagType, NewAutomatedAction, NewPromotion, NewProviderWarning, NewSecurityFlag,
    NewSystemAlert, NewWeeklyReport, OnboardingStats, PromotionType, Provider, ProviderActivity,
    ProviderStatus, ProviderSummary, ProviderWarning, Referral, ReferralBonus, ResponseStats, Review,
    ReviewSummary, SecurityFlag, Service, ServiceArea, ServiceRequestLog, SystemAlert, User,
    UserSummary, WeeklyReport, ZoneCount, LOW_RATING_THRESHOLD,
};
use domain::services::{
    AlertStore, BookingStore, DedupClaim, DedupStore, DemandStore, PromotionStore, ProviderStore,
    ReportStore, ReviewStore, SecurityFlagStore, StoreError, StoreHealth, StoreResult, UserStore,
};
use shared::validation::normalize_phone;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    services: HashMap<Uuid, Service>,
    users: HashMap<Uuid, User>,
    providers: HashMap<Uuid, Provider>,
    bookings: HashMap<Uuid, Booking>,
    reviews: Vec<Review>,
    referrals: HashMap<Uuid, Referral>,
    warnings: Vec<ProviderWarning>,
    flags: Vec<SecurityFlag>,
    alerts: Vec<SystemAlert>,
    actions: Vec<AutomatedActionLog>,
    promotions: Vec<ActivePromotion>,
    requests: Vec<ServiceRequestLog>,
    reports: BTreeMap<NaiveDate, WeeklyReport>,
    dedup: HashMap<String, DateTime<Utc>>,
}

impl Tables {
    /// Claims a dedup key unless an unexpired claim holds it.
    fn claim(&mut self, claim: &DedupClaim, now: DateTime<Utc>) -> bool {
        match self.dedup.get(&claim.key) {
            Some(expires_at) if *expires_at > now => false,
            _ => {
                self.dedup.insert(claim.key.clone(), claim.expires_at);
                true
            }
        }
    }

    fn context(&self, booking: &Booking) -> BookingContext {
        let service = self.services.get(&booking.service_id);
        BookingContext {
            booking: booking.clone(),
            service_name: service.map(|s| s.name.clone()).unwrap_or_default(),
            city: service.map(|s| s.city.clone()).unwrap_or_default(),
            category: service.map(|s| s.category.clone()).unwrap_or_default(),
        }
    }

    fn bookings_in<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a Booking> + 'a {
        self.bookings
            .values()
            .filter(move |b| b.created_at >= from && b.created_at < to)
    }

    fn new_flag(&self, flag: NewSecurityFlag, now: DateTime<Utc>) -> SecurityFlag {
        SecurityFlag {
            id: Uuid::new_v4(),
            subject: flag.subject,
            flag_type: flag.flag_type,
            status: FlagStatus::PendingReview,
            details: flag.details,
            created_at: now,
        }
    }
}

fn new_alert(alert: NewSystemAlert, dedup_key: Option<String>, now: DateTime<Utc>) -> SystemAlert {
    SystemAlert {
        id: Uuid::new_v4(),
        level: alert.level,
        title: alert.title,
        message: alert.message,
        details: alert.details,
        status: AlertStatus::Unread,
        dedup_key,
        created_at: now,
    }
}

/// Marketplace store held entirely in memory.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub async fn insert_service(&self, service: Service) {
        self.tables.write().await.services.insert(service.id, service);
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn insert_provider(&self, provider: Provider) {
        self.tables
            .write()
            .await
            .providers
            .insert(provider.id, provider);
    }

    pub async fn insert_booking(&self, booking: Booking) {
        self.tables.write().await.bookings.insert(booking.id, booking);
    }

    pub async fn insert_review(&self, review: Review) {
        self.tables.write().await.reviews.push(review);
    }

    pub async fn insert_referral(&self, referral: Referral) {
        self.tables
            .write()
            .await
            .referrals
            .insert(referral.id, referral);
    }

    pub async fn insert_flag(&self, flag: SecurityFlag) {
        self.tables.write().await.flags.push(flag);
    }

    /// Replaces a stored booking wholesale, e.g. to simulate a status change.
    pub async fn update_booking(&self, booking: Booking) -> bool {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&booking.id) {
            Some(existing) => {
                *existing = booking;
                true
            }
            None => false,
        }
    }

    pub async fn update_provider(&self, provider: Provider) -> bool {
        let mut tables = self.tables.write().await;
        match tables.providers.get_mut(&provider.id) {
            Some(existing) => {
                *existing = provider;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub async fn booking(&self, id: Uuid) -> Option<Booking> {
        self.tables.read().await.bookings.get(&id).cloned()
    }

    pub async fn provider(&self, id: Uuid) -> Option<Provider> {
        self.tables.read().await.providers.get(&id).cloned()
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        self.tables.read().await.users.get(&id).cloned()
    }

    pub async fn referral(&self, id: Uuid) -> Option<Referral> {
        self.tables.read().await.referrals.get(&id).cloned()
    }

    /// All alerts, oldest first.
    pub async fn alerts(&self) -> Vec<SystemAlert> {
        self.tables.read().await.alerts.clone()
    }

    /// All audit entries, oldest first.
    pub async fn actions(&self) -> Vec<AutomatedActionLog> {
        self.tables.read().await.actions.clone()
    }

    pub async fn flags(&self) -> Vec<SecurityFlag> {
        self.tables.read().await.flags.clone()
    }

    pub async fn warnings(&self) -> Vec<ProviderWarning> {
        self.tables.read().await.warnings.clone()
    }

    pub async fn promotions(&self) -> Vec<ActivePromotion> {
        self.tables.read().await.promotions.clone()
    }

    pub async fn reports(&self) -> Vec<WeeklyReport> {
        self.tables.read().await.reports.values().cloned().collect()
    }

    pub async fn service_requests(&self) -> Vec<ServiceRequestLog> {
        self.tables.read().await.requests.clone()
    }
}

#[async_trait::async_trait]
impl BookingStore for InMemoryStore {
    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<BookingContext>> {
        let tables = self.tables.read().await;
        Ok(tables.bookings.get(&id).map(|b| tables.context(b)))
    }

    async fn list_overdue_assigned(
        &self,
        scheduled_before: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingContext>> {
        let tables = self.tables.read().await;
        let mut overdue: Vec<BookingContext> = tables
            .bookings
            .values()
            .filter(|b| {
                b.status == BookingStatus::Assigned
                    && b.provider_id.is_some()
                    && b.scheduled_at.is_some_and(|s| s < scheduled_before)
            })
            .map(|b| tables.context(b))
            .collect();
        overdue.sort_by_key(|c| c.booking.scheduled_at);
        Ok(overdue)
    }

    async fn apply_assignment(&self, change: &AssignmentChange) -> StoreResult<Option<Booking>> {
        let mut tables = self.tables.write().await;
        let Some(booking) = tables.bookings.get_mut(&change.booking_id) else {
            return Ok(None);
        };
        if booking.status != change.expected_status
            || booking.provider_id != change.expected_provider
        {
            return Ok(None);
        }
        booking.provider_id = change.new_provider;
        booking.status = change.new_status;
        booking.accepted_at = None;
        booking.cancelled_by = None;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn count_bookings_for_user(&self, user_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .count() as i64)
    }

    async fn list_high_volume_bookers(
        &self,
        since: DateTime<Utc>,
        more_than: i64,
    ) -> StoreResult<Vec<BookingVolume>> {
        let tables = self.tables.read().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for booking in tables.bookings.values().filter(|b| b.created_at >= since) {
            *counts.entry(booking.user_id).or_default() += 1;
        }
        let mut volumes: Vec<BookingVolume> = counts
            .into_iter()
            .filter(|(_, bookings)| *bookings > more_than)
            .map(|(user_id, bookings)| BookingVolume { user_id, bookings })
            .collect();
        volumes.sort_by(|a, b| b.bookings.cmp(&a.bookings));
        Ok(volumes)
    }

    async fn list_response_stats(&self, since: DateTime<Utc>) -> StoreResult<Vec<ResponseStats>> {
        let tables = self.tables.read().await;
        let mut per_provider: HashMap<Uuid, Vec<f64>> = HashMap::new();
        for booking in tables.bookings.values().filter(|b| b.created_at >= since) {
            if let (Some(provider_id), Some(secs)) =
                (booking.provider_id, booking.response_time_secs())
            {
                per_provider.entry(provider_id).or_default().push(secs);
            }
        }
        Ok(per_provider
            .into_iter()
            .map(|(provider_id, times)| ResponseStats {
                provider_id,
                responses: times.len() as i64,
                avg_response_secs: times.iter().sum::<f64>() / times.len() as f64,
            })
            .collect())
    }

    async fn list_service_areas(&self) -> StoreResult<Vec<ServiceArea>> {
        let tables = self.tables.read().await;
        let areas: std::collections::BTreeSet<ServiceArea> = tables
            .services
            .values()
            .filter(|s| s.is_active)
            .map(|s| ServiceArea {
                city: s.city.clone(),
                category: s.category.clone(),
            })
            .collect();
        Ok(areas.into_iter().collect())
    }

    async fn list_service_cities(&self) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let cities: std::collections::BTreeSet<String> = tables
            .services
            .values()
            .filter(|s| s.is_active)
            .map(|s| s.city.clone())
            .collect();
        Ok(cities.into_iter().collect())
    }

    async fn count_bookings_in_area(
        &self,
        area: &ServiceArea,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.created_at >= since)
            .filter(|b| {
                tables
                    .services
                    .get(&b.service_id)
                    .is_some_and(|s| s.city == area.city && s.category == area.category)
            })
            .count() as i64)
    }

    async fn count_bookings_in_city(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings_in(from, to)
            .filter(|b| tables.services.get(&b.service_id).is_some_and(|s| s.city == city))
            .count() as i64)
    }

    async fn booking_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<BookingSummary> {
        let tables = self.tables.read().await;
        let mut summary = BookingSummary::default();
        for booking in tables.bookings_in(from, to) {
            summary.total += 1;
            if booking.status == BookingStatus::Completed {
                summary.completed += 1;
                summary.revenue += booking.total;
            }
            if let Some(service) = tables.services.get(&booking.service_id) {
                *summary.by_city.entry(service.city.clone()).or_default() += 1;
                *summary
                    .by_category
                    .entry(service.category.clone())
                    .or_default() += 1;
            }
        }
        Ok(summary)
    }
}

#[async_trait::async_trait]
impl ProviderStore for InMemoryStore {
    async fn get_provider(&self, id: Uuid) -> StoreResult<Option<Provider>> {
        Ok(self.tables.read().await.providers.get(&id).cloned())
    }

    async fn find_replacement_candidates(
        &self,
        category: &str,
        city: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<Vec<Provider>> {
        let tables = self.tables.read().await;
        let mut candidates: Vec<Provider> = tables
            .providers
            .values()
            .filter(|p| p.is_available() && p.covers(category, city))
            .filter(|p| Some(p.id) != exclude)
            .cloned()
            .collect();
        domain::models::rank_candidates(&mut candidates);
        Ok(candidates)
    }

    async fn pause_provider_with_warning(
        &self,
        warning: NewProviderWarning,
    ) -> StoreResult<Option<ProviderWarning>> {
        let mut tables = self.tables.write().await;
        let Some(provider) = tables.providers.get_mut(&warning.provider_id) else {
            return Ok(None);
        };
        provider.status = ProviderStatus::Paused;
        let stored = ProviderWarning {
            id: Uuid::new_v4(),
            provider_id: warning.provider_id,
            reason: warning.reason,
            details: warning.details,
            created_at: Utc::now(),
        };
        tables.warnings.push(stored.clone());
        Ok(Some(stored))
    }

    async fn pause_provider_with_flag(
        &self,
        provider_id: Uuid,
        flag: NewSecurityFlag,
    ) -> StoreResult<Option<SecurityFlag>> {
        let mut tables = self.tables.write().await;
        let Some(provider) = tables.providers.get_mut(&provider_id) else {
            return Ok(None);
        };
        provider.status = ProviderStatus::Paused;
        let stored = tables.new_flag(flag, Utc::now());
        tables.flags.push(stored.clone());
        Ok(Some(stored))
    }

    async fn count_providers_covering(&self, area: &ServiceArea) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .providers
            .values()
            .filter(|p| p.status == ProviderStatus::Active && p.covers(&area.category, &area.city))
            .count() as i64)
    }

    async fn count_available_providers(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.providers.values().filter(|p| p.is_available()).count() as i64)
    }

    async fn onboarding_stats(
        &self,
        since: DateTime<Utc>,
        zone_limit: usize,
    ) -> StoreResult<OnboardingStats> {
        let tables = self.tables.read().await;
        let completed_by: HashSet<Uuid> = tables
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Completed)
            .filter_map(|b| b.provider_id)
            .collect();

        let mut stats = OnboardingStats::default();
        let mut zones: HashMap<String, i64> = HashMap::new();
        for provider in tables.providers.values().filter(|p| p.created_at >= since) {
            stats.signups += 1;
            if provider.verified {
                stats.verified += 1;
            }
            if completed_by.contains(&provider.id) {
                stats.activated += 1;
            }
            for zone in &provider.zones {
                *zones.entry(zone.clone()).or_default() += 1;
            }
        }

        let mut top: Vec<ZoneCount> = zones
            .into_iter()
            .map(|(zone, providers)| ZoneCount { zone, providers })
            .collect();
        top.sort_by(|a, b| b.providers.cmp(&a.providers).then_with(|| a.zone.cmp(&b.zone)));
        top.truncate(zone_limit);
        stats.top_zones = top;
        Ok(stats)
    }

    async fn list_provider_activity(
        &self,
        created_before: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ProviderActivity>> {
        let tables = self.tables.read().await;
        let mut activity: Vec<ProviderActivity> = tables
            .providers
            .values()
            .filter(|p| {
                p.status == ProviderStatus::Active && p.verified && p.created_at < created_before
            })
            .map(|p| {
                let window = tables
                    .bookings
                    .values()
                    .filter(|b| b.provider_id == Some(p.id) && b.created_at >= since);
                let (mut total, mut completed) = (0, 0);
                for booking in window {
                    total += 1;
                    if booking.status == BookingStatus::Completed {
                        completed += 1;
                    }
                }
                ProviderActivity {
                    provider: p.clone(),
                    total_bookings: total,
                    completed_bookings: completed,
                }
            })
            .collect();
        activity.sort_by_key(|a| a.provider.created_at);
        Ok(activity)
    }

    async fn provider_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ProviderSummary> {
        let tables = self.tables.read().await;
        let mut summary = ProviderSummary::default();
        for provider in tables.providers.values() {
            let is_new = provider.created_at >= from && provider.created_at < to;
            if is_new {
                summary.new_providers += 1;
                if provider.verified {
                    summary.verified_providers += 1;
                }
            }
            if provider.status == ProviderStatus::Active {
                summary.active_providers += 1;
            }
        }
        Ok(summary)
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_users_by_phone(&self, phone: &str, exclude: Uuid) -> StoreResult<Vec<User>> {
        let normalized = normalize_phone(phone);
        let tables = self.tables.read().await;
        let mut matches: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.id != exclude && normalize_phone(&u.phone) == normalized)
            .cloned()
            .collect();
        matches.sort_by_key(|u| u.created_at);
        Ok(matches)
    }

    async fn credit_coins(&self, user_id: Uuid, amount: i64) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        user.coins += amount;
        Ok(user.coins)
    }

    async fn list_inactive_users(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let bookers: HashSet<Uuid> = tables.bookings.values().map(|b| b.user_id).collect();
        let mut inactive: Vec<User> = tables
            .users
            .values()
            .filter(|u| !u.shadow_banned && bookers.contains(&u.id) && u.is_inactive_since(cutoff))
            .cloned()
            .collect();
        inactive.sort_by_key(|u| u.created_at);
        Ok(inactive)
    }

    async fn user_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<UserSummary> {
        let tables = self.tables.read().await;
        let in_window = |at: DateTime<Utc>| at >= from && at < to;
        let new_users = tables.users.values().filter(|u| in_window(u.created_at)).count() as i64;
        let active_users = tables
            .users
            .values()
            .filter(|u| u.last_seen.is_some_and(in_window))
            .count() as i64;
        let referral_signups = tables
            .referrals
            .values()
            .filter_map(|r| r.referred_id)
            .filter_map(|id| tables.users.get(&id))
            .filter(|u| in_window(u.created_at))
            .count() as i64;
        Ok(UserSummary {
            new_users,
            active_users,
            referral_signups,
        })
    }

    async fn get_referral(&self, id: Uuid) -> StoreResult<Option<Referral>> {
        Ok(self.tables.read().await.referrals.get(&id).cloned())
    }

    async fn find_unredeemed_referral(&self, user_id: Uuid) -> StoreResult<Option<Referral>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referrals
            .values()
            .filter(|r| r.referred_id == Some(user_id) && !r.is_redeemed())
            .min_by_key(|r| r.created_at)
            .cloned())
    }

    async fn settle_referral(
        &self,
        id: Uuid,
        bonus: ReferralBonus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Referral>> {
        let mut tables = self.tables.write().await;
        let referral = match tables.referrals.get(&id) {
            Some(referral) if !referral.is_redeemed() => referral.clone(),
            _ => return Ok(None),
        };
        let Some(referred_id) = referral.referred_id else {
            return Ok(None);
        };
        for user_id in [referral.referrer_id, referred_id] {
            if !tables.users.contains_key(&user_id) {
                return Err(StoreError::NotFound(format!("user {}", user_id)));
            }
        }

        for (user_id, amount) in [
            (referral.referrer_id, bonus.referrer),
            (referred_id, bonus.referred),
        ] {
            if let Some(user) = tables.users.get_mut(&user_id) {
                user.coins += amount;
            }
        }
        let Some(stored) = tables.referrals.get_mut(&id) else {
            return Ok(None);
        };
        stored.redeemed_at = Some(at);
        Ok(Some(stored.clone()))
    }
}

#[async_trait::async_trait]
impl ReviewStore for InMemoryStore {
    async fn list_low_reviews(
        &self,
        provider_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Review>> {
        let tables = self.tables.read().await;
        let mut low: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| {
                r.provider_id == provider_id
                    && r.rating < LOW_RATING_THRESHOLD
                    && r.created_at >= since
            })
            .cloned()
            .collect();
        low.sort_by_key(|r| r.created_at);
        Ok(low)
    }

    async fn review_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ReviewSummary> {
        let tables = self.tables.read().await;
        Ok(ReviewSummary::from_ratings(
            tables
                .reviews
                .iter()
                .filter(|r| r.created_at >= from && r.created_at < to)
                .map(|r| r.rating),
        ))
    }
}

#[async_trait::async_trait]
impl SecurityFlagStore for InMemoryStore {
    async fn insert_security_flag(&self, flag: NewSecurityFlag) -> StoreResult<SecurityFlag> {
        let mut tables = self.tables.write().await;
        let stored = tables.new_flag(flag, Utc::now());
        tables.flags.push(stored.clone());
        Ok(stored)
    }

    async fn insert_security_flag_once(
        &self,
        flag: NewSecurityFlag,
        claim: &DedupClaim,
    ) -> StoreResult<Option<SecurityFlag>> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        if !tables.claim(claim, now) {
            return Ok(None);
        }
        let stored = tables.new_flag(flag, now);
        tables.flags.push(stored.clone());
        Ok(Some(stored))
    }

    async fn dismiss_stale_flags(
        &self,
        types: &[FlagType],
        created_before: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>> {
        let mut tables = self.tables.write().await;
        let mut dismissed = Vec::new();
        for flag in tables.flags.iter_mut() {
            if flag.status == FlagStatus::PendingReview
                && types.contains(&flag.flag_type)
                && flag.created_at < created_before
            {
                flag.status = FlagStatus::Dismissed;
                dismissed.push(flag.id);
            }
        }
        Ok(dismissed)
    }

    async fn count_security_flags(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .flags
            .iter()
            .filter(|f| f.created_at >= from && f.created_at < to)
            .count() as i64)
    }
}

#[async_trait::async_trait]
impl AlertStore for InMemoryStore {
    async fn insert_alert(&self, alert: NewSystemAlert) -> StoreResult<SystemAlert> {
        let stored = new_alert(alert, None, Utc::now());
        self.tables.write().await.alerts.push(stored.clone());
        Ok(stored)
    }

    async fn insert_alert_once(
        &self,
        alert: NewSystemAlert,
        claim: &DedupClaim,
    ) -> StoreResult<Option<SystemAlert>> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        if !tables.claim(claim, now) {
            return Ok(None);
        }
        let stored = new_alert(alert, Some(claim.key.clone()), now);
        tables.alerts.push(stored.clone());
        Ok(Some(stored))
    }

    async fn insert_action(&self, action: NewAutomatedAction) -> StoreResult<AutomatedActionLog> {
        let stored = AutomatedActionLog {
            id: Uuid::new_v4(),
            module: action.module,
            trigger: action.trigger,
            action_taken: action.action_taken,
            details: action.details,
            success: action.success,
            created_at: Utc::now(),
        };
        self.tables.write().await.actions.push(stored.clone());
        Ok(stored)
    }

    async fn list_recent_alerts(&self, limit: i64) -> StoreResult<Vec<SystemAlert>> {
        let tables = self.tables.read().await;
        Ok(tables
            .alerts
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn alert_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<AlertSummary> {
        let tables = self.tables.read().await;
        let mut summary = AlertSummary::default();
        for alert in tables
            .alerts
            .iter()
            .filter(|a| a.created_at >= from && a.created_at < to)
        {
            summary.add(alert.level, alert.status, 1);
        }
        Ok(summary)
    }

    async fn action_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<ActionSummary> {
        let tables = self.tables.read().await;
        let mut summary = ActionSummary::default();
        for action in tables
            .actions
            .iter()
            .filter(|a| a.created_at >= from && a.created_at < to)
        {
            summary.total += 1;
            if action.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
        }
        Ok(summary)
    }
}

#[async_trait::async_trait]
impl PromotionStore for InMemoryStore {
    async fn insert_promotion_once(
        &self,
        promotion: NewPromotion,
    ) -> StoreResult<Option<ActivePromotion>> {
        let now = Utc::now();
        let claim = DedupClaim::until(promotion.scope_key(), promotion.expires_at);
        let mut tables = self.tables.write().await;
        if !tables.claim(&claim, now) {
            return Ok(None);
        }
        let stored = ActivePromotion {
            id: Uuid::new_v4(),
            name: promotion.name,
            promotion_type: promotion.promotion_type,
            city: promotion.city,
            details: promotion.details,
            expires_at: promotion.expires_at,
            created_at: now,
        };
        tables.promotions.push(stored.clone());
        Ok(Some(stored))
    }

    async fn find_active_promotion(
        &self,
        promotion_type: PromotionType,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<ActivePromotion>> {
        let tables = self.tables.read().await;
        Ok(tables
            .promotions
            .iter()
            .filter(|p| p.promotion_type == promotion_type && p.is_active_at(at))
            .max_by_key(|p| p.created_at)
            .cloned())
    }
}

#[async_trait::async_trait]
impl DemandStore for InMemoryStore {
    async fn record_service_request(
        &self,
        search_term: &str,
        city: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<ServiceRequestLog> {
        let mut tables = self.tables.write().await;
        if let Some(log) = tables
            .requests
            .iter_mut()
            .find(|l| l.search_term == search_term && l.city == city)
        {
            log.count += 1;
            log.last_searched_at = at;
            return Ok(log.clone());
        }
        let log = ServiceRequestLog {
            id: Uuid::new_v4(),
            search_term: search_term.to_string(),
            city: city.to_string(),
            count: 1,
            last_searched_at: at,
            created_at: at,
        };
        tables.requests.push(log.clone());
        Ok(log)
    }

    async fn list_service_requests(
        &self,
        since: DateTime<Utc>,
        min_count: i64,
    ) -> StoreResult<Vec<ServiceRequestLog>> {
        let tables = self.tables.read().await;
        let mut logs: Vec<ServiceRequestLog> = tables
            .requests
            .iter()
            .filter(|l| l.last_searched_at >= since && l.count >= min_count)
            .cloned()
            .collect();
        logs.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_searched_at.cmp(&a.last_searched_at))
        });
        Ok(logs)
    }
}

#[async_trait::async_trait]
impl ReportStore for InMemoryStore {
    async fn find_weekly_report(
        &self,
        week_ending: NaiveDate,
    ) -> StoreResult<Option<WeeklyReport>> {
        Ok(self.tables.read().await.reports.get(&week_ending).cloned())
    }

    async fn insert_weekly_report(
        &self,
        report: NewWeeklyReport,
    ) -> StoreResult<Option<WeeklyReport>> {
        let mut tables = self.tables.write().await;
        if tables.reports.contains_key(&report.week_ending) {
            return Ok(None);
        }
        let stored = WeeklyReport {
            id: Uuid::new_v4(),
            week_ending: report.week_ending,
            summary: report.summary,
            created_at: Utc::now(),
        };
        tables.reports.insert(stored.week_ending, stored.clone());
        Ok(Some(stored))
    }
}

#[async_trait::async_trait]
impl DedupStore for InMemoryStore {
    async fn claim(&self, claim: &DedupClaim) -> StoreResult<bool> {
        Ok(self.tables.write().await.claim(claim, Utc::now()))
    }
}

#[async_trait::async_trait]
impl StoreHealth for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::models::FlagSubject;
    use std::sync::Arc;

    fn service(city: &str, category: &str) -> Service {
        Service {
            id: Uuid::new_v4(),
            name: format!("{} service", category),
            category: category.into(),
            city: city.into(),
            is_active: true,
        }
    }

    fn user(phone: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".into(),
            phone: phone.into(),
            coins: 0,
            last_seen: None,
            shadow_banned: false,
            created_at: Utc::now(),
        }
    }

    fn booking(user_id: Uuid, service_id: Uuid, provider_id: Option<Uuid>) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            user_id,
            provider_id,
            service_id,
            status: BookingStatus::Assigned,
            scheduled_at: Some(now - Duration::minutes(45)),
            total: 1200,
            accepted_at: Some(now - Duration::minutes(50)),
            cancelled_by: None,
            created_at: now - Duration::hours(1),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_claim_blocks_until_expiry() {
        let store = InMemoryStore::new();
        let live = DedupClaim::for_window("capacity-strain:Kathmandu", Duration::hours(24));
        assert!(store.claim(&live).await.unwrap());
        assert!(!store.claim(&live).await.unwrap());

        let expired = DedupClaim::until("reengagement:u1", Utc::now() - Duration::seconds(1));
        assert!(store.claim(&expired).await.unwrap());
        assert!(store.claim(&expired).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_guarded_inserts_store_one_alert() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let claim = DedupClaim::for_window("capacity-strain:Pokhara", Duration::hours(24));
                store
                    .insert_alert_once(
                        NewSystemAlert::warning("Capacity strain", "Pokhara", serde_json::json!({})),
                        &claim,
                    )
                    .await
                    .unwrap()
                    .is_some()
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        let alerts = store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].dedup_key.as_deref(), Some("capacity-strain:Pokhara"));
    }

    #[tokio::test]
    async fn test_apply_assignment_is_compare_and_set() {
        let store = InMemoryStore::new();
        let svc = service("Kathmandu", "plumbing");
        let original = Uuid::new_v4();
        let b = booking(Uuid::new_v4(), svc.id, Some(original));
        store.insert_service(svc).await;
        store.insert_booking(b.clone()).await;

        let first = AssignmentChange::reassign(&b, Uuid::new_v4());
        let updated = store.apply_assignment(&first).await.unwrap().unwrap();
        assert_eq!(updated.provider_id, first.new_provider);
        assert!(updated.accepted_at.is_none());

        // Second change still expects the original provider.
        let stale = AssignmentChange::release(&b);
        assert!(store.apply_assignment(&stale).await.unwrap().is_none());
    }

    fn provider() -> Provider {
        Provider {
            id: Uuid::new_v4(),
            name: "Sita".into(),
            phone: "9811111111".into(),
            status: ProviderStatus::Active,
            is_online: true,
            verified: true,
            skills: vec!["plumbing".into()],
            zones: vec!["Kathmandu".into()],
            on_time_pct: 90.0,
            completion_pct: 95.0,
            location: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_settle_referral_once() {
        let store = InMemoryStore::new();
        let referrer = user("9800000001");
        let referred = user("9800000002");
        store.insert_user(referrer.clone()).await;
        store.insert_user(referred.clone()).await;
        let referral = Referral {
            id: Uuid::new_v4(),
            referrer_id: referrer.id,
            referred_id: Some(referred.id),
            redeemed_at: None,
            created_at: Utc::now(),
        };
        store.insert_referral(referral.clone()).await;
        let bonus = ReferralBonus::default();

        assert!(store
            .settle_referral(referral.id, bonus, Utc::now())
            .await
            .unwrap()
            .is_some());
        assert!(store
            .settle_referral(referral.id, bonus, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.user(referrer.id).await.unwrap().coins, bonus.referrer);
        assert_eq!(store.user(referred.id).await.unwrap().coins, bonus.referred);
        assert!(store
            .find_unredeemed_referral(referred.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_settle_referral_with_missing_wallet_changes_nothing() {
        let store = InMemoryStore::new();
        let referrer = user("9800000003");
        store.insert_user(referrer.clone()).await;
        let referral = Referral {
            id: Uuid::new_v4(),
            referrer_id: referrer.id,
            referred_id: Some(Uuid::new_v4()),
            redeemed_at: None,
            created_at: Utc::now(),
        };
        store.insert_referral(referral.clone()).await;

        let result = store
            .settle_referral(referral.id, ReferralBonus::default(), Utc::now())
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(store.user(referrer.id).await.unwrap().coins, 0);
        assert!(!store.referral(referral.id).await.unwrap().is_redeemed());
    }

    #[tokio::test]
    async fn test_pause_with_warning_writes_both_or_neither() {
        let store = InMemoryStore::new();
        let p = provider();
        store.insert_provider(p.clone()).await;

        let warning = store
            .pause_provider_with_warning(NewProviderWarning {
                provider_id: p.id,
                reason: "Multiple low ratings within 30 days".into(),
                details: serde_json::json!({ "lowRatingCount": 2 }),
            })
            .await
            .unwrap();
        assert!(warning.is_some());
        assert_eq!(store.provider(p.id).await.unwrap().status, ProviderStatus::Paused);
        assert_eq!(store.warnings().await.len(), 1);

        let missing = store
            .pause_provider_with_warning(NewProviderWarning {
                provider_id: Uuid::new_v4(),
                reason: "Multiple low ratings within 30 days".into(),
                details: serde_json::json!({}),
            })
            .await
            .unwrap();
        assert!(missing.is_none());
        assert_eq!(store.warnings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_pause_with_flag_writes_both_or_neither() {
        let store = InMemoryStore::new();
        let p = provider();
        store.insert_provider(p.clone()).await;
        let flag = |id| NewSecurityFlag {
            subject: FlagSubject::Provider(id),
            flag_type: FlagType::FakeLocation,
            details: serde_json::json!({ "speedKmh": 1500.0 }),
        };

        let stored = store.pause_provider_with_flag(p.id, flag(p.id)).await.unwrap();
        assert_eq!(stored.unwrap().flag_type, FlagType::FakeLocation);
        assert_eq!(store.provider(p.id).await.unwrap().status, ProviderStatus::Paused);

        let unknown = Uuid::new_v4();
        assert!(store
            .pause_provider_with_flag(unknown, flag(unknown))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.flags().await.len(), 1);
    }

    #[tokio::test]
    async fn test_find_users_by_phone_normalizes() {
        let store = InMemoryStore::new();
        let a = user("980-000 0001");
        let b = user("(980) 0000001");
        let c = user("9800000002");
        store.insert_user(a.clone()).await;
        store.insert_user(b.clone()).await;
        store.insert_user(c).await;

        let matches = store.find_users_by_phone(&a.phone, a.id).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, b.id);
    }

    #[tokio::test]
    async fn test_weekly_report_written_once() {
        let store = InMemoryStore::new();
        let week = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let first = NewWeeklyReport {
            week_ending: week,
            summary: serde_json::json!({"bookings": 1}),
        };
        assert!(store.insert_weekly_report(first.clone()).await.unwrap().is_some());
        assert!(store.insert_weekly_report(first).await.unwrap().is_none());
        assert_eq!(store.reports().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_stale_only_touches_requested_types() {
        let store = InMemoryStore::new();
        let subject = FlagSubject::User(Uuid::new_v4());
        store
            .insert_security_flag(NewSecurityFlag {
                subject,
                flag_type: FlagType::ExcessiveBookings,
                details: serde_json::json!({}),
            })
            .await
            .unwrap();
        store
            .insert_security_flag(NewSecurityFlag {
                subject,
                flag_type: FlagType::PotentialAbuse,
                details: serde_json::json!({}),
            })
            .await
            .unwrap();

        let cutoff = Utc::now() + Duration::seconds(1);
        let dismissed = store
            .dismiss_stale_flags(&FlagType::LOW_PRIORITY, cutoff)
            .await
            .unwrap();
        assert_eq!(dismissed.len(), 1);

        let flags = store.flags().await;
        let abuse = flags
            .iter()
            .find(|f| f.flag_type == FlagType::PotentialAbuse)
            .unwrap();
        assert_eq!(abuse.status, FlagStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_booking_summary_groups_by_city() {
        let store = InMemoryStore::new();
        let ktm = service("Kathmandu", "plumbing");
        let pkr = service("Pokhara", "cleaning");
        let user_id = Uuid::new_v4();
        let mut done = booking(user_id, ktm.id, None);
        done.status = BookingStatus::Completed;
        store.insert_booking(done).await;
        store.insert_booking(booking(user_id, pkr.id, None)).await;
        store.insert_service(ktm).await;
        store.insert_service(pkr).await;

        let now = Utc::now();
        let summary = store
            .booking_summary(now - Duration::days(1), now)
            .await
            .unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.revenue, 1200);
        assert_eq!(summary.by_city.get("Pokhara"), Some(&1));
    }
}
