//! Subscription lookup trait.

use async_trait::async_trait;

use crate::error::BeaconResult;
use crate::webhook::WebhookSubscription;

/// Read access to registered webhook subscriptions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions of `business_id` with `active = true`.
    async fn list_active_subscriptions(
        &self,
        business_id: &str,
    ) -> BeaconResult<Vec<WebhookSubscription>>;
}
