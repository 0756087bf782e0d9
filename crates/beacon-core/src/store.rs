//! SQLite-backed subscription and delivery log storage.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use crate::error::{BeaconError, BeaconResult};
use crate::events::EventType;
use crate::traits::{DeliveryLogStore, SubscriptionStore};
use crate::webhook::{DeliveryRecord, WebhookSubscription};

const SUBSCRIPTION_COLUMNS: &str =
    "id, business_id, url, secret, events, active, description, created_at, updated_at";

const DELIVERY_COLUMNS: &str = "id, subscription_id, event, payload, status_code, response_body, \
     success, attempt, created_at";

/// SQLite store for webhook subscriptions and delivery records.
pub struct SqliteWebhookStore {
    conn: Mutex<Connection>,
}

impl SqliteWebhookStore {
    /// Open (or create) a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> BeaconResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> BeaconResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> BeaconResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> BeaconResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BeaconError::database("connection mutex poisoned"))
    }

    fn init_schema(&self) -> BeaconResult<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS webhook_subscriptions (
                id TEXT PRIMARY KEY,
                business_id TEXT NOT NULL,
                url TEXT NOT NULL,
                secret TEXT NOT NULL,
                events TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_subscriptions_business
                ON webhook_subscriptions(business_id, active);

            CREATE TABLE IF NOT EXISTS webhook_deliveries (
                id TEXT PRIMARY KEY,
                subscription_id TEXT NOT NULL,
                event TEXT NOT NULL,
                payload TEXT NOT NULL,
                status_code INTEGER,
                response_body TEXT,
                success INTEGER NOT NULL,
                attempt INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_deliveries_subscription
                ON webhook_deliveries(subscription_id, created_at);
        "#,
        )?;
        Ok(())
    }

    /// Register a subscription.
    pub fn create_subscription(&self, subscription: &WebhookSubscription) -> BeaconResult<()> {
        let events: Vec<&str> = subscription.events.iter().map(EventType::as_str).collect();
        self.conn()?.execute(
            &format!(
                "INSERT INTO webhook_subscriptions ({SUBSCRIPTION_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                subscription.id,
                subscription.business_id,
                subscription.url,
                subscription.secret,
                serde_json::to_string(&events)?,
                subscription.active,
                subscription.description,
                format_timestamp(&subscription.created_at),
                format_timestamp(&subscription.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Get a subscription by ID, active or not.
    pub fn get_subscription(&self, id: &str) -> BeaconResult<Option<WebhookSubscription>> {
        let subscription = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM webhook_subscriptions WHERE id = ?1"
                ),
                [id],
                row_to_subscription,
            )
            .optional()?;
        Ok(subscription)
    }

    /// Activate or deactivate a subscription.
    pub fn set_active(&self, id: &str, active: bool) -> BeaconResult<()> {
        let updated = self.conn()?.execute(
            "UPDATE webhook_subscriptions SET active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, format_timestamp(&Utc::now()), id],
        )?;
        if updated == 0 {
            return Err(BeaconError::not_found(format!("subscription {id}")));
        }
        Ok(())
    }

    /// Get a delivery record by ID.
    pub fn get_delivery(&self, id: &str) -> BeaconResult<Option<DeliveryRecord>> {
        let record = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE id = ?1"
                ),
                [id],
                row_to_delivery,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recent delivery records for a subscription, newest first.
    pub fn list_deliveries(
        &self,
        subscription_id: &str,
        limit: usize,
    ) -> BeaconResult<Vec<DeliveryRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries \
             WHERE subscription_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let records = stmt
            .query_map(params![subscription_id, limit as i64], row_to_delivery)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[async_trait]
impl SubscriptionStore for SqliteWebhookStore {
    async fn list_active_subscriptions(
        &self,
        business_id: &str,
    ) -> BeaconResult<Vec<WebhookSubscription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM webhook_subscriptions \
             WHERE business_id = ?1 AND active = 1 ORDER BY created_at"
        ))?;
        let subscriptions = stmt
            .query_map([business_id], row_to_subscription)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subscriptions)
    }
}

#[async_trait]
impl DeliveryLogStore for SqliteWebhookStore {
    async fn insert_delivery_record(&self, record: &DeliveryRecord) -> BeaconResult<()> {
        self.conn()?.execute(
            &format!(
                "INSERT INTO webhook_deliveries ({DELIVERY_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                record.id,
                record.subscription_id,
                record.event.as_str(),
                serde_json::to_string(&record.payload)?,
                record.status_code,
                record.response_body,
                record.success,
                record.attempt,
                format_timestamp(&record.created_at),
            ],
        )?;
        Ok(())
    }
}

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<WebhookSubscription> {
    let events_json: String = row.get(4)?;
    let names: Vec<String> =
        serde_json::from_str(&events_json).map_err(|e| conversion_error(4, e))?;

    // Unknown names (e.g. a retired event type) are skipped, not fatal
    let events: BTreeSet<EventType> = names
        .iter()
        .filter_map(|name| match EventType::from_str(name) {
            Ok(event) => Some(event),
            Err(_) => {
                tracing::warn!("Ignoring unknown event type '{}' on subscription", name);
                None
            }
        })
        .collect();

    Ok(WebhookSubscription {
        id: row.get(0)?,
        business_id: row.get(1)?,
        url: row.get(2)?,
        secret: row.get(3)?,
        events,
        active: row.get(5)?,
        description: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
        updated_at: parse_timestamp(row, 8)?,
    })
}

fn row_to_delivery(row: &Row<'_>) -> rusqlite::Result<DeliveryRecord> {
    let event: String = row.get(2)?;
    let payload: String = row.get(3)?;

    Ok(DeliveryRecord {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        event: EventType::from_str(&event).map_err(|e| conversion_error(2, e))?,
        payload: serde_json::from_str(&payload).map_err(|e| conversion_error(3, e))?,
        status_code: row.get(4)?,
        response_body: row.get(5)?,
        success: row.get(6)?,
        attempt: row.get(7)?,
        created_at: parse_timestamp(row, 8)?,
    })
}

// Fixed-width UTC so that text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
