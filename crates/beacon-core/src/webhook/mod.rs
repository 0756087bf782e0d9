//! Webhook dispatch: signing, delivery with retry, fan-out and logging
//!
//! This module provides:
//! - HMAC-SHA256 signing and secret generation
//! - The delivery engine (one endpoint, fixed retry schedule)
//! - The dispatcher (subscription matching, concurrent fan-out)
//! - The best-effort delivery log

mod delivery;
mod dispatcher;
mod envelope;
mod log;
mod replay;
mod signature;
mod subscription;

pub use delivery::{
    is_retryable_status, truncate_body, DeliveryAttemptResult, DeliveryEngine, DeliveryOutcome,
    RetrySchedule, DELIVERY_HEADER, EVENT_HEADER, MAX_RETRIES_EXCEEDED, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
pub use dispatcher::WebhookDispatcher;
pub use envelope::{EventEnvelope, EventPayload};
pub use log::{DeliveryLog, DeliveryRecord};
pub use replay::replay_delivery;
pub use signature::{generate_secret, sign, verify_signature, SECRET_PREFIX, SIGNATURE_PREFIX};
pub use subscription::WebhookSubscription;
