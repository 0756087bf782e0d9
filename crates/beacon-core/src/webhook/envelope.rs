//! Outbound payload envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BeaconResult;
use crate::events::EventType;

/// The JSON object POSTed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event: EventType,
    pub business_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// An event payload together with its canonical body.
///
/// The body is serialized once at construction and never again, so every
/// subscriber and every retry receives (and is signed over) the same bytes.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    payload: EventPayload,
    body: String,
}

impl EventEnvelope {
    /// Build an envelope stamped with the current UTC time.
    pub fn new(
        event: EventType,
        business_id: impl Into<String>,
        data: Map<String, Value>,
    ) -> BeaconResult<Self> {
        Self::from_payload(EventPayload {
            event,
            business_id: business_id.into(),
            timestamp: Utc::now(),
            data,
        })
    }

    /// Rebuild an envelope from a previously sent payload.
    pub fn from_payload(payload: EventPayload) -> BeaconResult<Self> {
        let body = serde_json::to_string(&payload)?;
        Ok(Self { payload, body })
    }

    pub fn event(&self) -> EventType {
        self.payload.event
    }

    pub fn business_id(&self) -> &str {
        &self.payload.business_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.payload.timestamp
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.payload.data
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// The exact bytes sent and signed.
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("zeta".into(), json!(1));
        data.insert("alpha".into(), json!({"b": 2.5, "a": "x"}));
        data
    }

    #[test]
    fn test_body_shape() {
        let envelope = EventEnvelope::new(EventType::BookingConfirmed, "biz-1", data()).unwrap();
        let parsed: Value = serde_json::from_str(envelope.body()).unwrap();

        assert_eq!(parsed["event"], "booking.confirmed");
        assert_eq!(parsed["business_id"], "biz-1");
        assert_eq!(parsed["data"]["zeta"], 1);
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn test_body_is_canonical_for_payload() {
        let envelope = EventEnvelope::new(EventType::MentionDetected, "biz-1", data()).unwrap();
        let rebuilt = EventEnvelope::from_payload(envelope.payload().clone()).unwrap();

        assert_eq!(envelope.body(), rebuilt.body());
        // Map keys come out sorted regardless of insertion order
        let alpha = envelope.body().find("\"alpha\"").unwrap();
        let zeta = envelope.body().find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_payload_round_trips_through_body() {
        let envelope = EventEnvelope::new(EventType::PromotionExpired, "biz-9", data()).unwrap();
        let decoded: EventPayload = serde_json::from_str(envelope.body()).unwrap();
        assert_eq!(&decoded, envelope.payload());
    }
}
