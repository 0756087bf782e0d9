//! beacon-core - Signed webhook dispatch.
//!
//! Pushes domain events (bookings, promotions, mentions, reports) to the
//! URLs businesses register, signed with a per-subscription HMAC secret,
//! retried on transient failures, and logged.
//!
//! # Example
//!
//! ```ignore
//! use beacon_core::{
//!     BusinessEvent, DispatchConfig, EventType, SqliteWebhookStore, WebhookDispatcher,
//! };
//! use std::sync::Arc;
//!
//! let config = DispatchConfig::from_env()?;
//! let store = Arc::new(SqliteWebhookStore::new(&config.database_path)?);
//! let dispatcher = WebhookDispatcher::new(store.clone(), store, &config)?;
//!
//! // From a request handler: returns immediately, never fails the request
//! dispatcher.spawn_event(
//!     BusinessEvent::new("biz-42", EventType::BookingConfirmed).with_field("booking_id", "bk-7"),
//! );
//!
//! // On shutdown
//! dispatcher.shutdown().await;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod traits;
pub mod webhook;

// Re-export commonly used types
pub use config::DispatchConfig;
pub use error::{BeaconError, BeaconResult, ErrorCode};
pub use events::{BusinessEvent, EventBus, EventSubscriber, EventType};
pub use store::SqliteWebhookStore;
pub use traits::{DeliveryLogStore, SubscriptionStore};
pub use webhook::{
    generate_secret, replay_delivery, sign, verify_signature, DeliveryAttemptResult,
    DeliveryEngine, DeliveryLog, DeliveryOutcome, DeliveryRecord, EventEnvelope, EventPayload,
    RetrySchedule, WebhookDispatcher, WebhookSubscription,
};
