//! Domain models.

pub mod alert;
pub mod booking;
pub mod demand;
pub mod promotion;
pub mod provider;
pub mod report;
pub mod review;
pub mod security_flag;
pub mod user;

pub use alert::{
    ActionSummary, AlertLevel, AlertStatus, AlertSummary, AutomatedActionLog,
    NewAutomatedAction, NewSystemAlert, SystemAlert,
};
pub use booking::{
    AssignmentChange, Booking, BookingContext, BookingStatus, BookingSummary,
    CancellationSource, Service,
};
pub use demand::{ServiceArea, ServiceRequestLog};
pub use promotion::{ActivePromotion, NewPromotion, PromotionType, ReferralBonus};
pub use provider::{
    rank_candidates, GeoFix, NewProviderWarning, OnboardingStats, Provider, ProviderActivity,
    ProviderStatus, ProviderSummary, ProviderWarning, ZoneCount,
};
pub use report::{NewWeeklyReport, WeeklyReport};
pub use review::{Review, ReviewSummary, LOW_RATING_THRESHOLD};
pub use security_flag::{
    FlagStatus, FlagSubject, FlagType, NewSecurityFlag, ResponseStats, SecurityFlag,
};
pub use user::{BookingVolume, Referral, User, UserSummary};
