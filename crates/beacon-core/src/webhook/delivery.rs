//! Webhook delivery with fixed-schedule retry and signature
//!
//! Delivers one envelope to one subscription:
//! - HMAC-SHA256 signature over the exact body bytes
//! - Up to three attempts, 1s then 5s apart, each with its own timeout
//! - 2xx succeeds, 4xx (except 429) stops, 5xx / 429 / transport errors retry
//!
//! Delivery never fails: every way an attempt sequence can end is a
//! [`DeliveryOutcome`].

use backon::{BackoffBuilder, Retryable};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DispatchConfig;
use crate::error::{BeaconError, BeaconResult};
use crate::events::EventType;
use crate::webhook::signature::sign;
use crate::webhook::{EventEnvelope, WebhookSubscription};

/// Header carrying the event type wire name.
pub const EVENT_HEADER: &str = "X-Webhook-Event";
/// Header carrying `sha256=<hex>` over the body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Header carrying the millisecond epoch at which the sequence started.
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";
/// Header carrying a per-sequence UUID, identical across retries.
pub const DELIVERY_HEADER: &str = "X-Webhook-Delivery";

/// Body recorded when a sequence exhausts without any error detail.
pub const MAX_RETRIES_EXCEEDED: &str = "Max retries exceeded";

/// Fixed delays between attempts.
///
/// The first attempt is immediate; there is one attempt more than delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Total attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32 + 1
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(vec![Duration::from_secs(1), Duration::from_secs(5)])
    }
}

impl BackoffBuilder for RetrySchedule {
    type Backoff = std::vec::IntoIter<Duration>;

    fn build(self) -> Self::Backoff {
        self.delays.into_iter()
    }
}

/// How an attempt sequence ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Endpoint answered 2xx.
    Delivered { status: u16, body: Option<String> },
    /// Endpoint answered a non-retryable status; retrying will not help.
    Rejected { status: u16, body: Option<String> },
    /// Every attempt failed transiently. `status` is `None` when the last
    /// attempt never got a response.
    Exhausted {
        status: Option<u16>,
        body: Option<String>,
    },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Final HTTP status, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Delivered { status, .. } | Self::Rejected { status, .. } => Some(*status),
            Self::Exhausted { status, .. } => *status,
        }
    }

    /// Truncated response body or transport error message.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Delivered { body, .. }
            | Self::Rejected { body, .. }
            | Self::Exhausted { body, .. } => body.as_deref(),
        }
    }
}

/// Result of one finished attempt sequence for one subscription.
#[derive(Debug, Clone)]
pub struct DeliveryAttemptResult {
    pub subscription_id: String,
    pub event: EventType,
    pub envelope: Arc<EventEnvelope>,
    pub outcome: DeliveryOutcome,
    /// 1-based attempt at which the sequence ended
    pub attempt: u32,
}

impl DeliveryAttemptResult {
    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.outcome.status_code()
    }

    pub fn response_body(&self) -> Option<&str> {
        self.outcome.body()
    }
}

/// 5xx and 429 are worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}

/// Cut `body` to at most `max_chars` characters.
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

/// Response to a single POST, before classification.
struct Accepted {
    status: u16,
    body: Option<String>,
}

#[derive(Debug)]
enum AttemptError {
    Status { status: u16, body: Option<String> },
    Transport(String),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::Transport(_) => true,
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, .. } => write!(f, "HTTP {}", status),
            Self::Transport(msg) => write!(f, "{}", msg),
        }
    }
}

/// Webhook delivery engine
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct DeliveryEngine {
    client: Client,
    schedule: RetrySchedule,
    max_body_chars: usize,
}

impl DeliveryEngine {
    /// Create an engine with an explicit per-attempt timeout and schedule.
    pub fn new(
        request_timeout: Duration,
        user_agent: &str,
        schedule: RetrySchedule,
        max_body_chars: usize,
    ) -> BeaconResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| BeaconError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            schedule,
            max_body_chars,
        })
    }

    pub fn from_config(config: &DispatchConfig) -> BeaconResult<Self> {
        Self::new(
            config.request_timeout(),
            &config.user_agent,
            config.retry_schedule(),
            config.max_response_body_chars,
        )
    }

    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    /// Deliver an envelope to a subscription's endpoint.
    ///
    /// The body, signature, timestamp and delivery id are fixed before the
    /// first attempt and reused verbatim on every retry.
    pub async fn deliver(
        &self,
        subscription: &WebhookSubscription,
        envelope: Arc<EventEnvelope>,
    ) -> DeliveryAttemptResult {
        let event_type = envelope.event();
        let body = envelope.body();
        let signature = sign(body.as_bytes(), &subscription.secret);
        let timestamp_ms = Utc::now().timestamp_millis().to_string();
        let delivery_id = uuid::Uuid::new_v4().to_string();
        let attempts = AtomicU32::new(0);

        let deliver_once = || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                subscription_id = %subscription.id,
                delivery_id = %delivery_id,
                attempt,
                "Posting webhook to {}",
                subscription.url
            );

            let response = self
                .client
                .post(&subscription.url)
                .header(CONTENT_TYPE, "application/json")
                .header(EVENT_HEADER, event_type.as_str())
                .header(SIGNATURE_HEADER, &signature)
                .header(TIMESTAMP_HEADER, &timestamp_ms)
                .header(DELIVERY_HEADER, &delivery_id)
                .body(body.to_owned())
                .send()
                .await
                .map_err(|e| AttemptError::Transport(describe_transport_error(&e)))?;

            let status = response.status().as_u16();
            let body = self.read_body(response).await;
            if (200..300).contains(&status) {
                Ok(Accepted { status, body })
            } else {
                Err(AttemptError::Status { status, body })
            }
        };

        let result = deliver_once
            .retry(self.schedule.clone())
            .when(|e| e.is_retryable())
            .notify(|err, dur| {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    "Webhook delivery to {} failed, retrying in {:?}: {}",
                    subscription.url,
                    dur,
                    err
                );
            })
            .await;

        let outcome = classify(result, self.max_body_chars);
        let attempt = attempts.load(Ordering::SeqCst);

        match &outcome {
            DeliveryOutcome::Delivered { status, .. } => tracing::info!(
                subscription_id = %subscription.id,
                event = %event_type,
                status,
                attempt,
                "Webhook delivered"
            ),
            DeliveryOutcome::Rejected { status, .. } => tracing::warn!(
                subscription_id = %subscription.id,
                event = %event_type,
                status,
                attempt,
                "Webhook rejected by endpoint, not retrying"
            ),
            DeliveryOutcome::Exhausted { status, .. } => tracing::warn!(
                subscription_id = %subscription.id,
                event = %event_type,
                status = ?status,
                attempt,
                "Webhook delivery exhausted all attempts"
            ),
        }

        DeliveryAttemptResult {
            subscription_id: subscription.id.clone(),
            event: event_type,
            envelope,
            outcome,
            attempt,
        }
    }

    /// Read the response body as text; unreadable bodies are not captured.
    async fn read_body(&self, response: Response) -> Option<String> {
        match response.text().await {
            Ok(text) => Some(truncate_body(&text, self.max_body_chars)),
            Err(e) => {
                tracing::debug!("Could not read webhook response body: {}", e);
                None
            }
        }
    }
}

/// Map the final attempt of a sequence to its outcome.
///
/// Only called once retrying has stopped, so a retryable status here means
/// the schedule ran out.
fn classify(result: Result<Accepted, AttemptError>, max_body_chars: usize) -> DeliveryOutcome {
    match result {
        Ok(Accepted { status, body }) => DeliveryOutcome::Delivered { status, body },
        Err(AttemptError::Status { status, body }) if is_retryable_status(status) => {
            DeliveryOutcome::Exhausted {
                status: Some(status),
                body,
            }
        }
        Err(AttemptError::Status { status, body }) => DeliveryOutcome::Rejected { status, body },
        Err(AttemptError::Transport(message)) => DeliveryOutcome::Exhausted {
            status: None,
            body: Some(if message.is_empty() {
                MAX_RETRIES_EXCEEDED.to_string()
            } else {
                truncate_body(&message, max_body_chars)
            }),
        },
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Request timed out: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_classification() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(410));
    }

    #[test]
    fn test_truncate_body_counts_chars() {
        assert_eq!(truncate_body("hello", 10), "hello");
        assert_eq!(truncate_body("hello", 3), "hel");
        assert_eq!(truncate_body("héllo", 2), "hé");
        assert_eq!(truncate_body(&"x".repeat(5000), 2000).len(), 2000);
    }

    #[test]
    fn test_default_schedule() {
        let schedule = RetrySchedule::default();
        assert_eq!(schedule.max_attempts(), 3);
        let delays: Vec<_> = schedule.build().collect();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(5)]);
    }

    #[test]
    fn test_outcome_accessors() {
        let exhausted = DeliveryOutcome::Exhausted {
            status: None,
            body: Some(MAX_RETRIES_EXCEEDED.to_string()),
        };
        assert!(!exhausted.is_success());
        assert_eq!(exhausted.status_code(), None);
        assert_eq!(exhausted.body(), Some(MAX_RETRIES_EXCEEDED));

        let rejected = DeliveryOutcome::Rejected {
            status: 404,
            body: None,
        };
        assert_eq!(rejected.status_code(), Some(404));
        assert!(DeliveryOutcome::Delivered {
            status: 204,
            body: None
        }
        .is_success());
    }

    #[test]
    fn test_classify_final_attempt() {
        let delivered = classify(
            Ok(Accepted {
                status: 201,
                body: None,
            }),
            2000,
        );
        assert!(delivered.is_success());

        let exhausted = classify(
            Err(AttemptError::Status {
                status: 502,
                body: Some("bad gateway".into()),
            }),
            2000,
        );
        assert_eq!(exhausted.status_code(), Some(502));
        assert!(matches!(exhausted, DeliveryOutcome::Exhausted { .. }));

        let rejected = classify(
            Err(AttemptError::Status {
                status: 400,
                body: None,
            }),
            2000,
        );
        assert!(matches!(rejected, DeliveryOutcome::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_classify_transport_error_body() {
        let silent = classify(Err(AttemptError::Transport(String::new())), 2000);
        assert_eq!(
            silent,
            DeliveryOutcome::Exhausted {
                status: None,
                body: Some(MAX_RETRIES_EXCEEDED.to_string()),
            }
        );

        let long = classify(Err(AttemptError::Transport("e".repeat(50))), 10);
        assert_eq!(long.body(), Some("eeeeeeeeee"));
        assert_eq!(long.status_code(), None);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(DeliveryOutcome::Rejected {
            status: 410,
            body: Some("gone".into()),
        })
        .unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["status"], 410);
    }
}
