//! Marketplace mutation events.
//!
//! The data layer reports created and updated records through
//! [`MutationHook`]. The [`EventRouter`] queues them and hands each one to
//! the monitor operation that reacts to it.

pub mod handlers;
pub mod router;

use domain::models::{Booking, Provider, Review, User};
use serde::Serialize;

pub use handlers::{FailureLabels, HandlerTable, MutationHandler};
pub use router::{DispatchStats, EventRouter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Review,
    Booking,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Created,
    Updated,
}

/// A record as it looked at one point of a mutation.
#[derive(Debug, Clone)]
pub enum EntitySnapshot {
    User(User),
    Review(Review),
    Booking(Booking),
    Provider(Provider),
}

impl EntitySnapshot {
    pub fn entity(&self) -> EntityKind {
        match self {
            EntitySnapshot::User(_) => EntityKind::User,
            EntitySnapshot::Review(_) => EntityKind::Review,
            EntitySnapshot::Booking(_) => EntityKind::Booking,
            EntitySnapshot::Provider(_) => EntityKind::Provider,
        }
    }
}

impl From<User> for EntitySnapshot {
    fn from(user: User) -> Self {
        EntitySnapshot::User(user)
    }
}

impl From<Review> for EntitySnapshot {
    fn from(review: Review) -> Self {
        EntitySnapshot::Review(review)
    }
}

impl From<Booking> for EntitySnapshot {
    fn from(booking: Booking) -> Self {
        EntitySnapshot::Booking(booking)
    }
}

impl From<Provider> for EntitySnapshot {
    fn from(provider: Provider) -> Self {
        EntitySnapshot::Provider(provider)
    }
}

/// One successful create or update.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub entity: EntityKind,
    pub kind: MutationKind,
    /// Record before the change; only present for updates.
    pub before: Option<EntitySnapshot>,
    pub after: EntitySnapshot,
}

impl MutationEvent {
    pub fn created(after: impl Into<EntitySnapshot>) -> Self {
        let after = after.into();
        Self {
            entity: after.entity(),
            kind: MutationKind::Created,
            before: None,
            after,
        }
    }

    pub fn updated(before: impl Into<EntitySnapshot>, after: impl Into<EntitySnapshot>) -> Self {
        let after = after.into();
        Self {
            entity: after.entity(),
            kind: MutationKind::Updated,
            before: Some(before.into()),
            after,
        }
    }
}

/// Entry point for whatever data layer the marketplace uses.
///
/// Implementations must return quickly and never fail the caller.
pub trait MutationHook: Send + Sync {
    fn on_created(&self, after: EntitySnapshot);

    fn on_updated(&self, before: EntitySnapshot, after: EntitySnapshot);
}
