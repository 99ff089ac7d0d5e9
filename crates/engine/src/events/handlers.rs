//! Reactions to marketplace mutations.

use std::collections::HashMap;
use std::sync::Arc;

use domain::models::{BookingStatus, CancellationSource};
use domain::services::MarketplaceStore;
use tracing::debug;

use super::{EntityKind, EntitySnapshot, MutationEvent, MutationKind};
use crate::monitors::flow::{self, ReviewEvent};
use crate::monitors::security::{self, LocationUpdate};
use crate::monitors::{growth, MonitorError, MonitorResult, Monitors};

/// Audit labels written when a handler fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureLabels {
    pub module: &'static str,
    pub trigger: &'static str,
    pub action: &'static str,
}

/// Reacts to one kind of mutation.
#[async_trait::async_trait]
pub trait MutationHandler: Send + Sync {
    fn labels(&self, event: &MutationEvent) -> FailureLabels;

    async fn handle(&self, event: &MutationEvent) -> MonitorResult<()>;
}

fn mismatch(event: &MutationEvent) -> MonitorError {
    MonitorError::InvalidInput(format!(
        "unexpected snapshot for {:?} {:?} event",
        event.entity, event.kind
    ))
}

/// Routing table from (entity, kind) to handler.
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: HashMap<(EntityKind, MutationKind), Arc<dyn MutationHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The marketplace reactions, wired to `monitors`.
    pub fn standard(monitors: Arc<Monitors>, store: Arc<dyn MarketplaceStore>) -> Self {
        Self::new()
            .with(
                EntityKind::User,
                MutationKind::Created,
                Arc::new(WelcomeNewUser {
                    monitors: Arc::clone(&monitors),
                }),
            )
            .with(
                EntityKind::Review,
                MutationKind::Created,
                Arc::new(CheckProviderPerformance {
                    monitors: Arc::clone(&monitors),
                }),
            )
            .with(
                EntityKind::Booking,
                MutationKind::Created,
                Arc::new(CheckBookingPhone {
                    monitors: Arc::clone(&monitors),
                    store,
                }),
            )
            .with(
                EntityKind::Booking,
                MutationKind::Updated,
                Arc::new(BookingTransition {
                    monitors: Arc::clone(&monitors),
                }),
            )
            .with(
                EntityKind::Provider,
                MutationKind::Updated,
                Arc::new(ProviderMoved { monitors }),
            )
    }

    pub fn with(
        mut self,
        entity: EntityKind,
        kind: MutationKind,
        handler: Arc<dyn MutationHandler>,
    ) -> Self {
        self.handlers.insert((entity, kind), handler);
        self
    }

    pub fn route(&self, event: &MutationEvent) -> Option<Arc<dyn MutationHandler>> {
        self.handlers.get(&(event.entity, event.kind)).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

struct WelcomeNewUser {
    monitors: Arc<Monitors>,
}

#[async_trait::async_trait]
impl MutationHandler for WelcomeNewUser {
    fn labels(&self, _event: &MutationEvent) -> FailureLabels {
        FailureLabels {
            module: growth::MODULE,
            trigger: "New user registration",
            action: "Failed to send welcome message",
        }
    }

    async fn handle(&self, event: &MutationEvent) -> MonitorResult<()> {
        let EntitySnapshot::User(user) = &event.after else {
            return Err(mismatch(event));
        };
        self.monitors
            .growth
            .send_welcome_message(user.id, &user.phone)
            .await?;
        Ok(())
    }
}

struct CheckProviderPerformance {
    monitors: Arc<Monitors>,
}

#[async_trait::async_trait]
impl MutationHandler for CheckProviderPerformance {
    fn labels(&self, _event: &MutationEvent) -> FailureLabels {
        FailureLabels {
            module: flow::MODULE,
            trigger: "New review",
            action: "Failed to check provider performance",
        }
    }

    async fn handle(&self, event: &MutationEvent) -> MonitorResult<()> {
        let EntitySnapshot::Review(review) = &event.after else {
            return Err(mismatch(event));
        };
        self.monitors
            .flow
            .monitor_provider_performance(ReviewEvent::from(review))
            .await?;
        Ok(())
    }
}

struct CheckBookingPhone {
    monitors: Arc<Monitors>,
    store: Arc<dyn MarketplaceStore>,
}

#[async_trait::async_trait]
impl MutationHandler for CheckBookingPhone {
    fn labels(&self, _event: &MutationEvent) -> FailureLabels {
        FailureLabels {
            module: security::MODULE,
            trigger: "New booking",
            action: "Failed to check phone number abuse",
        }
    }

    async fn handle(&self, event: &MutationEvent) -> MonitorResult<()> {
        let EntitySnapshot::Booking(booking) = &event.after else {
            return Err(mismatch(event));
        };
        let user = self
            .store
            .get_user(booking.user_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("user {}", booking.user_id)))?;
        self.monitors
            .security
            .check_phone_number_abuse(user.id, &user.phone, Some(booking.id))
            .await?;
        Ok(())
    }
}

/// Booking status transitions the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    CancelledByProvider,
    Completed,
}

fn transition(event: &MutationEvent) -> MonitorResult<Option<Transition>> {
    let (Some(EntitySnapshot::Booking(before)), EntitySnapshot::Booking(after)) =
        (&event.before, &event.after)
    else {
        return Err(mismatch(event));
    };

    if before.status == after.status {
        return Ok(None);
    }
    Ok(match after.status {
        BookingStatus::Cancelled if after.cancelled_by == Some(CancellationSource::Provider) => {
            Some(Transition::CancelledByProvider)
        }
        BookingStatus::Completed => Some(Transition::Completed),
        _ => None,
    })
}

struct BookingTransition {
    monitors: Arc<Monitors>,
}

#[async_trait::async_trait]
impl MutationHandler for BookingTransition {
    fn labels(&self, event: &MutationEvent) -> FailureLabels {
        match transition(event) {
            Ok(Some(Transition::Completed)) => FailureLabels {
                module: growth::MODULE,
                trigger: "Booking completed",
                action: "Failed to process referral reward",
            },
            _ => FailureLabels {
                module: flow::MODULE,
                trigger: "Provider cancelled booking",
                action: "Failed to handle provider cancellation",
            },
        }
    }

    async fn handle(&self, event: &MutationEvent) -> MonitorResult<()> {
        let EntitySnapshot::Booking(after) = &event.after else {
            return Err(mismatch(event));
        };
        match transition(event)? {
            Some(Transition::CancelledByProvider) => {
                self.monitors
                    .flow
                    .handle_provider_cancellation(after.id)
                    .await?;
            }
            Some(Transition::Completed) => {
                self.monitors
                    .growth
                    .settle_referral_for_user(after.user_id, after.total)
                    .await?;
            }
            None => debug!(booking_id = %after.id, "Booking update needs no action"),
        }
        Ok(())
    }
}

struct ProviderMoved {
    monitors: Arc<Monitors>,
}

#[async_trait::async_trait]
impl MutationHandler for ProviderMoved {
    fn labels(&self, _event: &MutationEvent) -> FailureLabels {
        FailureLabels {
            module: security::MODULE,
            trigger: "Provider location update",
            action: "Failed to check location plausibility",
        }
    }

    async fn handle(&self, event: &MutationEvent) -> MonitorResult<()> {
        let (Some(EntitySnapshot::Provider(before)), EntitySnapshot::Provider(after)) =
            (&event.before, &event.after)
        else {
            return Err(mismatch(event));
        };
        let Some(current) = after.location else {
            return Ok(());
        };
        if before.location == Some(current) {
            return Ok(());
        }

        self.monitors
            .security
            .check_fake_location(LocationUpdate {
                provider_id: after.id,
                previous: before.location,
                current,
            })
            .await?;
        Ok(())
    }
}
