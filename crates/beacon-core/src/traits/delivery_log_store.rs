//! Delivery log persistence trait.

use async_trait::async_trait;

use crate::error::BeaconResult;
use crate::webhook::DeliveryRecord;

/// Append-only sink for delivery records.
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    /// Insert one record. Records are never updated afterwards.
    async fn insert_delivery_record(&self, record: &DeliveryRecord) -> BeaconResult<()>;
}
