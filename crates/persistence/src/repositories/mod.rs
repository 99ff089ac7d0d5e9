//! Repository implementations for database operations.

pub mod alert;
pub mod booking;
pub mod dedup;
pub mod demand;
pub mod promotion;
pub mod provider;
pub mod report;
pub mod review;
pub mod security_flag;
pub mod user;

pub use alert::AlertRepository;
pub use booking::BookingRepository;
pub use dedup::DedupRepository;
pub use demand::DemandRepository;
pub use promotion::PromotionRepository;
pub use provider::ProviderRepository;
pub use report::ReportRepository;
pub use review::ReviewRepository;
pub use security_flag::SecurityFlagRepository;
pub use user::UserRepository;

/// Upsert that claims a dedup key, succeeding only when the key is new or
/// its previous claim expired. Used as the first CTE of guarded inserts:
/// `$1` is the key and `$2` the expiry.
pub(crate) const CLAIM_CTE: &str = r#"
    claim AS (
        INSERT INTO dedup_keys (key, claimed_at, expires_at)
        VALUES ($1, NOW(), $2)
        ON CONFLICT (key) DO UPDATE
            SET claimed_at = NOW(), expires_at = EXCLUDED.expires_at
            WHERE dedup_keys.expires_at <= NOW()
        RETURNING key
    )
"#;
