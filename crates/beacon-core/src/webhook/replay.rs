//! Re-send a logged delivery.

use std::sync::Arc;

use crate::error::{BeaconError, BeaconResult};
use crate::store::SqliteWebhookStore;
use crate::webhook::{
    DeliveryAttemptResult, DeliveryEngine, DeliveryLog, EventEnvelope, EventPayload,
};

/// Deliver the envelope stored in delivery record `delivery_id` again.
///
/// The payload (including its original timestamp) is re-sent unchanged and
/// signed with the subscription's current secret. The new attempt sequence
/// gets its own log record. Inactive subscriptions are refused.
pub async fn replay_delivery(
    store: &SqliteWebhookStore,
    engine: &DeliveryEngine,
    log: &DeliveryLog,
    delivery_id: &str,
) -> BeaconResult<DeliveryAttemptResult> {
    let record = store
        .get_delivery(delivery_id)?
        .ok_or_else(|| BeaconError::not_found(format!("delivery {delivery_id}")))?;

    let subscription = store
        .get_subscription(&record.subscription_id)?
        .ok_or_else(|| {
            BeaconError::not_found(format!("subscription {}", record.subscription_id))
        })?;

    if !subscription.active {
        return Err(BeaconError::SubscriptionInactive(subscription.id));
    }

    let payload: EventPayload = serde_json::from_value(record.payload)?;
    let envelope = Arc::new(EventEnvelope::from_payload(payload)?);

    tracing::info!(
        delivery_id,
        subscription_id = %subscription.id,
        event = %envelope.event(),
        "Replaying webhook delivery"
    );

    let result = engine.deliver(&subscription, envelope).await;
    log.record(&result).await;
    Ok(result)
}
