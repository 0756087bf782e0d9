//! Common test utilities for beacon-core integration tests.
//!
//! Provides wiremock responders, store mocks and fixtures for exercising
//! delivery against real HTTP endpoints.

#![allow(dead_code)]

use async_trait::async_trait;
use beacon_core::{
    BeaconResult, DeliveryEngine, DeliveryLogStore, DeliveryRecord, EventType, RetrySchedule,
    SubscriptionStore, WebhookSubscription,
};
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::{Request, Respond, ResponseTemplate};

/// Standard test secret
pub const SECRET: &str = "whsec_test_secret_key_12345";

/// Standard test business IDs
pub const BUSINESS_A: &str = "biz-a";
pub const BUSINESS_B: &str = "biz-b";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Engine with a short timeout and the given delays, so tests run fast.
pub fn fast_engine(timeout_ms: u64, delays_ms: &[u64]) -> DeliveryEngine {
    let delays = delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();
    DeliveryEngine::new(
        Duration::from_millis(timeout_ms),
        "beacon-test/1.0",
        RetrySchedule::new(delays),
        2000,
    )
    .unwrap()
}

/// Active subscription with the standard secret.
pub fn subscription(business_id: &str, url: &str, events: &[EventType]) -> WebhookSubscription {
    WebhookSubscription::new(business_id, url)
        .with_events(events.iter().copied())
        .with_secret(SECRET)
}

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting webhook requests
// ---------------------------------------------------------------------------

/// A captured HTTP request with body, headers and arrival time.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub received_at: Instant,
}

impl CapturedRequest {
    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON.
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

// ---------------------------------------------------------------------------
// SequenceResponder - answers with a scripted list of statuses
// ---------------------------------------------------------------------------

/// A wiremock responder that returns `statuses` in order, repeating the
/// last one, and captures every request.
#[derive(Clone)]
pub struct SequenceResponder {
    statuses: Vec<u16>,
    body: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl SequenceResponder {
    pub fn new(statuses: &[u16]) -> Self {
        assert!(!statuses.is_empty());
        Self {
            statuses: statuses.to_vec(),
            body: String::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `status`.
    pub fn always(status: u16) -> Self {
        Self::new(&[status])
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Respond for SequenceResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut requests = self.requests.lock().unwrap();
        let status = self.statuses[requests.len().min(self.statuses.len() - 1)];
        requests.push(CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
            received_at: Instant::now(),
        });
        ResponseTemplate::new(status).set_body_string(self.body.clone())
    }
}

// ---------------------------------------------------------------------------
// DelayedResponder - answers slower than the engine's timeout
// ---------------------------------------------------------------------------

/// A wiremock responder that adds a delay before responding.
#[derive(Clone)]
pub struct DelayedResponder {
    delay: Duration,
}

impl DelayedResponder {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Respond for DelayedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_delay(self.delay)
    }
}

// ---------------------------------------------------------------------------
// Store mocks
// ---------------------------------------------------------------------------

mock! {
    pub Subscriptions {}

    #[async_trait]
    impl SubscriptionStore for Subscriptions {
        async fn list_active_subscriptions(
            &self,
            business_id: &str,
        ) -> BeaconResult<Vec<WebhookSubscription>>;
    }
}

mock! {
    pub DeliveryLogSink {}

    #[async_trait]
    impl DeliveryLogStore for DeliveryLogSink {
        async fn insert_delivery_record(&self, record: &DeliveryRecord) -> BeaconResult<()>;
    }
}
