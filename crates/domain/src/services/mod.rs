//! Domain services.

pub mod analytics;
pub mod geo;
pub mod notification;
pub mod store;

pub use analytics::{growth_percentage, health_score, utilization_percent, week_boundary, HealthInputs, WeekBoundary};
pub use geo::{haversine_distance, Travel, EARTH_RADIUS_METERS};
pub use notification::{
    LogNotificationPort, MockNotificationPort, NotificationPort, NotificationResult,
    SentNotification,
};
pub use store::{
    AlertStore, BookingStore, DedupClaim, DedupStore, DemandStore, MarketplaceStore,
    PromotionStore, ProviderStore, ReportStore, ReviewStore, SecurityFlagStore, StoreError,
    StoreHealth, StoreResult, UserStore,
};
