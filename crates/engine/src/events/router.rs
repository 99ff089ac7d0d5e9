//! Queue between the data layer and the monitors.
//!
//! Producers never wait on monitors: events go onto a bounded channel with
//! `try_send` and are dropped with a warning when it is full. One dispatcher
//! task drains the channel and runs every handler in its own task, so a
//! failing handler only costs an audit entry.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::handlers::HandlerTable;
use super::{EntitySnapshot, MutationEvent, MutationHook};
use crate::services::AlertSink;

/// Counters describing what the router has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub handled: u64,
    pub failed: u64,
    /// Events with no handler for their (entity, kind).
    pub ignored: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    handled: AtomicU64,
    failed: AtomicU64,
    ignored: AtomicU64,
    /// Events accepted but not yet fully processed.
    pending: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            enqueued: self.enqueued.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
            handled: self.handled.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            ignored: self.ignored.load(Ordering::SeqCst),
        }
    }

    fn finish(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct EventRouter {
    tx: mpsc::Sender<MutationEvent>,
    rx: Mutex<Option<mpsc::Receiver<MutationEvent>>>,
    handlers: Arc<HandlerTable>,
    sink: AlertSink,
    counters: Arc<Counters>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl EventRouter {
    /// Create a router with a queue of `capacity` events. Nothing is
    /// dispatched until [`EventRouter::start`].
    pub fn new(capacity: usize, handlers: HandlerTable, sink: AlertSink) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            handlers: Arc::new(handlers),
            sink,
            counters: Arc::new(Counters::default()),
            dispatcher: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Run `operation`; when it succeeds, queue the event `describe` builds
    /// from its result. The operation's result is returned untouched.
    pub async fn intercept<T, E, F, D>(&self, operation: F, describe: D) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        D: FnOnce(&T) -> MutationEvent,
    {
        let output = operation.await?;
        self.enqueue(describe(&output));
        Ok(output)
    }

    /// Queue an event without waiting. Returns false when it was dropped.
    pub fn enqueue(&self, event: MutationEvent) -> bool {
        let (entity, kind) = (event.entity, event.kind);
        self.counters.pending.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("ops_events_enqueued_total").increment(1);
                true
            }
            Err(e) => {
                self.counters.finish(&self.counters.dropped);
                metrics::counter!("ops_events_dropped_total").increment(1);
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "router stopped",
                };
                warn!(entity = ?entity, kind = ?kind, reason, "Mutation event dropped");
                false
            }
        }
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Start the dispatcher. Calling it again is a no-op.
    pub async fn start(&self) {
        let Some(mut rx) = self.rx.lock().await.take() else {
            debug!("Event router already started");
            return;
        };
        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handlers = Arc::clone(&self.handlers);
        let counters = Arc::clone(&self.counters);
        let sink = self.sink.clone();

        let handle = tokio::spawn(async move {
            info!(handlers = handlers.len(), "Event router started");
            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    next = rx.recv() => match next {
                        Some(event) => dispatch(event, &handlers, &counters, &sink),
                        None => break,
                    },
                }
            }
            info!("Event router stopped");
        });
        *self.dispatcher.lock().await = Some(handle);
    }

    /// Stop the dispatcher and wait up to `timeout` for it to exit.
    /// Events still queued are not dispatched.
    pub async fn shutdown(&self, timeout: Duration) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Event dispatcher panicked: {}", e),
                Err(_) => warn!("Event dispatcher shutdown timed out after {:?}", timeout),
            }
        }
    }

    /// Wait until every accepted event has been handled. Returns false on
    /// timeout.
    pub async fn wait_until_idle(&self, timeout: Duration) -> bool {
        let idle = async {
            while self.counters.pending.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }
}

fn dispatch(event: MutationEvent, handlers: &HandlerTable, counters: &Arc<Counters>, sink: &AlertSink) {
    let Some(handler) = handlers.route(&event) else {
        debug!(entity = ?event.entity, kind = ?event.kind, "No handler for mutation event");
        counters.finish(&counters.ignored);
        return;
    };

    let labels = handler.labels(&event);
    let counters = Arc::clone(counters);
    let sink = sink.clone();
    let (entity, kind) = (event.entity, event.kind);

    tokio::spawn(async move {
        let run = tokio::spawn(async move { handler.handle(&event).await });
        let failure = match run.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(join_error) => Some(format!("handler task aborted: {}", join_error)),
        };

        match failure {
            None => {
                debug!(entity = ?entity, kind = ?kind, "Mutation event handled");
                counters.finish(&counters.handled);
            }
            Some(message) => {
                error!(
                    entity = ?entity,
                    kind = ?kind,
                    module = labels.module,
                    error = %message,
                    "Mutation handler failed"
                );
                metrics::counter!("ops_event_handler_failures_total", "module" => labels.module)
                    .increment(1);
                sink.log_failure(labels.module, labels.trigger, labels.action, &message)
                    .await;
                counters.finish(&counters.failed);
            }
        }
    });
}

impl MutationHook for EventRouter {
    fn on_created(&self, after: EntitySnapshot) {
        self.enqueue(MutationEvent::created(after));
    }

    fn on_updated(&self, before: EntitySnapshot, after: EntitySnapshot) {
        self.enqueue(MutationEvent::updated(before, after));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handlers::{FailureLabels, MutationHandler};
    use crate::events::{EntityKind, MutationKind};
    use crate::monitors::{MonitorError, MonitorResult};
    use chrono::Utc;
    use domain::models::User;
    use persistence::InMemoryStore;
    use uuid::Uuid;

    struct Recording {
        seen: Arc<std::sync::Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MutationHandler for Recording {
        fn labels(&self, _event: &MutationEvent) -> FailureLabels {
            FailureLabels {
                module: "TestModule",
                trigger: "Test trigger",
                action: "Test action failed",
            }
        }

        async fn handle(&self, event: &MutationEvent) -> MonitorResult<()> {
            if let EntitySnapshot::User(user) = &event.after {
                if let Ok(mut seen) = self.seen.lock() {
                    seen.push(user.name.clone());
                }
            }
            if self.fail {
                Err(MonitorError::InvalidInput("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: "9800000000".to_string(),
            coins: 0,
            last_seen: None,
            shadow_banned: false,
            created_at: Utc::now(),
        }
    }

    fn router(capacity: usize, fail: bool) -> (Arc<InMemoryStore>, Arc<std::sync::Mutex<Vec<String>>>, EventRouter) {
        let store = Arc::new(InMemoryStore::new());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handlers = HandlerTable::new().with(
            EntityKind::User,
            MutationKind::Created,
            Arc::new(Recording {
                seen: Arc::clone(&seen),
                fail,
            }),
        );
        let router = EventRouter::new(capacity, handlers, AlertSink::new(store.clone()));
        (store, seen, router)
    }

    #[tokio::test]
    async fn test_intercept_returns_result_and_enqueues() {
        let (_, seen, router) = router(8, false);
        router.start().await;

        let result: Result<User, String> = router
            .intercept(async { Ok(user("Asha")) }, |u| MutationEvent::created(u.clone()))
            .await;

        assert_eq!(result.unwrap().name, "Asha");
        assert!(router.wait_until_idle(Duration::from_secs(2)).await);
        assert_eq!(seen.lock().unwrap().as_slice(), ["Asha".to_string()]);
        assert_eq!(router.dispatch_stats().handled, 1);
    }

    #[tokio::test]
    async fn test_failed_operation_emits_nothing() {
        let (_, _, router) = router(8, false);
        router.start().await;

        let result: Result<User, String> = router
            .intercept(async { Err("insert failed".to_string()) }, |u: &User| {
                MutationEvent::created(u.clone())
            })
            .await;

        assert_eq!(result.unwrap_err(), "insert failed");
        assert_eq!(router.dispatch_stats().enqueued, 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_audited_not_propagated() {
        let (store, _, router) = router(8, true);
        router.start().await;

        let result: Result<User, String> = router
            .intercept(async { Ok(user("Bikash")) }, |u| MutationEvent::created(u.clone()))
            .await;

        assert!(result.is_ok());
        assert!(router.wait_until_idle(Duration::from_secs(2)).await);
        assert_eq!(router.dispatch_stats().failed, 1);
        let actions = store.actions().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].module, "TestModule");
        assert!(!actions[0].success);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (_, _, router) = router(2, false);

        assert!(router.enqueue(MutationEvent::created(user("a"))));
        assert!(router.enqueue(MutationEvent::created(user("b"))));
        assert!(!router.enqueue(MutationEvent::created(user("c"))));

        let stats = router.dispatch_stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dropped, 1);

        router.start().await;
        assert!(router.wait_until_idle(Duration::from_secs(2)).await);
        assert_eq!(router.dispatch_stats().handled, 2);
    }

    #[tokio::test]
    async fn test_unrouted_events_are_ignored() {
        let (_, seen, router) = router(8, false);
        router.start().await;

        let u = user("Chandra");
        router.on_updated(u.clone().into(), u.into());

        assert!(router.wait_until_idle(Duration::from_secs(2)).await);
        assert_eq!(router.dispatch_stats().ignored, 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_queued_before_start_are_dispatched() {
        let (_, seen, router) = router(16, false);
        for name in ["one", "two", "three"] {
            router.on_created(user(name).into());
        }
        router.start().await;

        assert!(router.wait_until_idle(Duration::from_secs(2)).await);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_stops_dispatcher() {
        let (_, _, router) = router(8, false);
        router.start().await;
        router.shutdown(Duration::from_secs(1)).await;

        assert!(!router.enqueue(MutationEvent::created(user("late"))));
        let stats = router.dispatch_stats();
        assert_eq!(stats.handled, 0);
        assert_eq!(stats.dropped, 1);
    }
}
