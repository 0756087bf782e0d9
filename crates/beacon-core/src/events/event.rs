//! Domain events that integrators can subscribe to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Closed set of event types a webhook subscription can select.
///
/// The wire name (`booking.confirmed`, ...) is used for serialization,
/// parsing, the `X-Webhook-Event` header and the subscription store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
pub enum EventType {
    #[serde(rename = "promotion.created")]
    #[strum(serialize = "promotion.created")]
    PromotionCreated,
    #[serde(rename = "promotion.updated")]
    #[strum(serialize = "promotion.updated")]
    PromotionUpdated,
    #[serde(rename = "promotion.expired")]
    #[strum(serialize = "promotion.expired")]
    PromotionExpired,
    /// A promotion metric (views, clicks, redemptions) crossed a threshold.
    #[serde(rename = "promotion.milestone_reached")]
    #[strum(serialize = "promotion.milestone_reached")]
    PromotionMilestoneReached,
    #[serde(rename = "booking.created")]
    #[strum(serialize = "booking.created")]
    BookingCreated,
    #[serde(rename = "booking.confirmed")]
    #[strum(serialize = "booking.confirmed")]
    BookingConfirmed,
    #[serde(rename = "booking.cancelled")]
    #[strum(serialize = "booking.cancelled")]
    BookingCancelled,
    #[serde(rename = "booking.completed")]
    #[strum(serialize = "booking.completed")]
    BookingCompleted,
    /// A periodic metrics report is available for download.
    #[serde(rename = "metrics.report_ready")]
    #[strum(serialize = "metrics.report_ready")]
    MetricsReportReady,
    /// The business was mentioned on a monitored channel.
    #[serde(rename = "mention.detected")]
    #[strum(serialize = "mention.detected")]
    MentionDetected,
}

impl EventType {
    /// Get the wire name of this event type.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

/// A domain event raised by business logic, addressed to one business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessEvent {
    /// Business whose subscriptions should be notified
    pub business_id: String,
    /// What happened
    pub event_type: EventType,
    /// Event-specific data, delivered verbatim under `data`
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl BusinessEvent {
    pub fn new(business_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            business_id: business_id.into(),
            event_type,
            data: Map::new(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Builder: add a single data field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}
