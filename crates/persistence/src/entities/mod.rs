//! Database entity definitions (row mappings).

pub mod alert;
pub mod booking;
pub mod demand;
pub mod promotion;
pub mod provider;
pub mod report;
pub mod review;
pub mod security_flag;
pub mod user;

pub use alert::{AutomatedActionLogEntity, SystemAlertEntity};
pub use booking::{BookingContextEntity, BookingEntity};
pub use demand::ServiceRequestLogEntity;
pub use promotion::ActivePromotionEntity;
pub use provider::{ProviderActivityEntity, ProviderEntity, ProviderWarningEntity};
pub use report::WeeklyReportEntity;
pub use review::ReviewEntity;
pub use security_flag::SecurityFlagEntity;
pub use user::{ReferralEntity, UserEntity};
