//! Best-effort delivery log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::BeaconResult;
use crate::events::EventType;
use crate::traits::DeliveryLogStore;
use crate::webhook::delivery::{truncate_body, DeliveryAttemptResult};

/// One persisted row per finished attempt sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: String,
    pub subscription_id: String,
    pub event: EventType,
    /// The full envelope as sent, for replay and support.
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    pub success: bool,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Build the row for a finished sequence, bounding the stored body.
    pub fn from_result(
        result: &DeliveryAttemptResult,
        max_body_chars: usize,
    ) -> BeaconResult<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            subscription_id: result.subscription_id.clone(),
            event: result.event,
            payload: serde_json::to_value(result.envelope.payload())?,
            status_code: result.status_code(),
            response_body: result
                .response_body()
                .map(|body| truncate_body(body, max_body_chars)),
            success: result.success(),
            attempt: result.attempt,
            created_at: Utc::now(),
        })
    }
}

/// Records delivery outcomes without ever affecting them.
#[derive(Clone)]
pub struct DeliveryLog {
    store: Arc<dyn DeliveryLogStore>,
    max_body_chars: usize,
}

impl DeliveryLog {
    pub fn new(store: Arc<dyn DeliveryLogStore>, max_body_chars: usize) -> Self {
        Self {
            store,
            max_body_chars,
        }
    }

    /// Insert one record for `result`. Failures are logged and dropped.
    pub async fn record(&self, result: &DeliveryAttemptResult) {
        let record = match DeliveryRecord::from_result(result, self.max_body_chars) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    subscription_id = %result.subscription_id,
                    "Failed to build delivery record: {}",
                    e
                );
                return;
            }
        };

        if let Err(e) = self.store.insert_delivery_record(&record).await {
            tracing::warn!(
                subscription_id = %record.subscription_id,
                event = %record.event,
                success = record.success,
                "Failed to write delivery log: {}",
                e
            );
        }
    }
}
