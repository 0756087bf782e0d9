//! Webhook subscriptions registered by businesses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::events::EventType;
use crate::webhook::signature::generate_secret;

/// A business's registration of a URL for a set of event types.
///
/// Read-only to the dispatcher; created and edited through the management
/// operations of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Unique identifier
    pub id: String,
    /// Owning business
    pub business_id: String,
    /// Endpoint receiving POSTs
    pub url: String,
    /// HMAC signing secret, generated once at creation
    #[serde(skip_serializing, default)]
    pub secret: String,
    /// Event types this subscription receives
    pub events: BTreeSet<EventType>,
    /// Inactive subscriptions are never dispatched to
    pub active: bool,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Create an active subscription with a freshly generated secret.
    pub fn new(business_id: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            business_id: business_id.into(),
            url: url.into(),
            secret: generate_secret(),
            events: BTreeSet::new(),
            active: true,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: subscribe to specific events
    pub fn with_events(mut self, events: impl IntoIterator<Item = EventType>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: set a known secret instead of the generated one
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Check if this subscription should receive the given event type.
    ///
    /// An empty event set receives nothing.
    pub fn should_receive(&self, event_type: EventType) -> bool {
        self.active && self.events.contains(&event_type)
    }
}
