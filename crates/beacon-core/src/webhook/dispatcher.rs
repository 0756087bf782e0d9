//! Event fan-out to matching subscriptions.
//!
//! [`WebhookDispatcher::fire_event`] is the boundary between business logic
//! and webhook delivery: nothing that goes wrong behind it is returned to
//! the caller. Deliveries to different subscriptions run concurrently and
//! are joined without short-circuiting.

use futures::future::join_all;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::DispatchConfig;
use crate::error::BeaconResult;
use crate::events::{BusinessEvent, EventBus, EventType};
use crate::traits::{DeliveryLogStore, SubscriptionStore};
use crate::webhook::{DeliveryAttemptResult, DeliveryEngine, DeliveryLog, EventEnvelope};

/// Dispatches business events to webhook subscriptions.
///
/// Clones share the engine, stores and background task tracker.
#[derive(Clone)]
pub struct WebhookDispatcher {
    subscriptions: Arc<dyn SubscriptionStore>,
    engine: DeliveryEngine,
    log: DeliveryLog,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl WebhookDispatcher {
    /// Create a dispatcher from configuration.
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        delivery_log: Arc<dyn DeliveryLogStore>,
        config: &DispatchConfig,
    ) -> BeaconResult<Self> {
        let engine = DeliveryEngine::from_config(config)?;
        let log = DeliveryLog::new(delivery_log, config.max_response_body_chars);
        Ok(Self::with_engine(subscriptions, log, engine))
    }

    /// Create a dispatcher around an existing engine and log.
    pub fn with_engine(
        subscriptions: Arc<dyn SubscriptionStore>,
        log: DeliveryLog,
        engine: DeliveryEngine,
    ) -> Self {
        Self {
            subscriptions,
            engine,
            log,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn engine(&self) -> &DeliveryEngine {
        &self.engine
    }

    /// Fire an event and wait for every matching delivery to finish.
    ///
    /// Never fails: lookup errors, envelope errors and panics during fan-out
    /// are logged here and go no further.
    pub async fn fire_event(
        &self,
        business_id: &str,
        event_type: EventType,
        data: Map<String, Value>,
    ) {
        let dispatched = AssertUnwindSafe(self.dispatch(business_id, event_type, data))
            .catch_unwind()
            .await;

        match dispatched {
            Ok(Ok(results)) => {
                if !results.is_empty() {
                    let delivered = results.iter().filter(|r| r.success()).count();
                    tracing::info!(
                        business_id,
                        event = %event_type,
                        delivered,
                        failed = results.len() - delivered,
                        "Webhook fan-out finished"
                    );
                }
            }
            Ok(Err(e)) => tracing::error!(
                business_id,
                event = %event_type,
                "Webhook dispatch failed: {}",
                e
            ),
            Err(_) => tracing::error!(
                business_id,
                event = %event_type,
                "Webhook dispatch panicked"
            ),
        }
    }

    /// Resolve matching subscriptions and deliver to all of them.
    ///
    /// Returns one result per matching active subscription, each already
    /// written to the delivery log. A delivery that panics is logged and
    /// left out of the results. Errors only come from the subscription
    /// lookup and envelope construction.
    pub async fn dispatch(
        &self,
        business_id: &str,
        event_type: EventType,
        data: Map<String, Value>,
    ) -> BeaconResult<Vec<DeliveryAttemptResult>> {
        let subscriptions = self.subscriptions.list_active_subscriptions(business_id).await?;
        if subscriptions.is_empty() {
            tracing::debug!(business_id, "No active webhook subscriptions");
            return Ok(Vec::new());
        }

        let matching: Vec<_> = subscriptions
            .into_iter()
            .filter(|s| s.should_receive(event_type))
            .collect();
        if matching.is_empty() {
            tracing::debug!(
                business_id,
                event = %event_type,
                "No subscriptions match event type"
            );
            return Ok(Vec::new());
        }

        let envelope = Arc::new(EventEnvelope::new(event_type, business_id, data)?);

        tracing::info!(
            business_id,
            event = %event_type,
            subscription_count = matching.len(),
            "Delivering event to matching subscriptions"
        );

        // Deliver to all subscriptions concurrently
        let deliveries = matching.iter().map(|subscription| {
            let envelope = envelope.clone();
            async move {
                let delivered = AssertUnwindSafe(async {
                    let result = self.engine.deliver(subscription, envelope).await;
                    self.log.record(&result).await;
                    result
                })
                .catch_unwind()
                .await;

                // A panicking branch must not cancel its siblings
                match delivered {
                    Ok(result) => Some(result),
                    Err(_) => {
                        tracing::error!(
                            subscription_id = %subscription.id,
                            event = %event_type,
                            "Webhook delivery panicked"
                        );
                        None
                    }
                }
            }
        });

        Ok(join_all(deliveries).await.into_iter().flatten().collect())
    }

    /// Fire an event in the background.
    ///
    /// The task is tracked, so [`shutdown`](Self::shutdown) waits for it.
    pub fn spawn_event(&self, event: BusinessEvent) -> JoinHandle<()> {
        let dispatcher = self.clone();
        self.tracker.spawn(async move {
            dispatcher
                .fire_event(&event.business_id, event.event_type, event.data)
                .await;
        })
    }

    /// Start a background task that fires every event emitted on `bus`.
    ///
    /// Each event gets its own task so a slow endpoint never holds up the
    /// next event. The listener stops when the bus is dropped or on
    /// [`shutdown`](Self::shutdown).
    pub fn listen(&self, bus: &EventBus) -> JoinHandle<()> {
        let dispatcher = self.clone();
        let mut subscriber = bus.subscribe();
        let shutdown = self.shutdown.clone();

        self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = subscriber.recv() => match event {
                        Some(event) => {
                            dispatcher.spawn_event(event);
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!("Webhook event listener stopped");
        })
    }

    /// Stop listening and wait for in-flight deliveries to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
