//! Replay of logged deliveries.

mod common;

use beacon_core::{
    replay_delivery, BeaconError, DeliveryLog, EventType, SqliteWebhookStore, WebhookDispatcher,
};
use common::*;
use serde_json::{json, Map};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

struct Fixture {
    server: MockServer,
    responder: SequenceResponder,
    store: Arc<SqliteWebhookStore>,
    dispatcher: WebhookDispatcher,
    log: DeliveryLog,
}

/// Endpoint fails once with 500 then accepts; single-attempt engine.
async fn failing_then_ok() -> Fixture {
    let server = MockServer::start().await;
    let responder = SequenceResponder::new(&[500, 200]);
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let store = Arc::new(SqliteWebhookStore::in_memory().unwrap());
    let log = DeliveryLog::new(store.clone(), 2000);
    let dispatcher =
        WebhookDispatcher::with_engine(store.clone(), log.clone(), fast_engine(1000, &[]));

    Fixture {
        server,
        responder,
        store,
        dispatcher,
        log,
    }
}

#[tokio::test]
async fn test_replay_resends_original_payload() {
    let fx = failing_then_ok().await;
    let sub = subscription(
        BUSINESS_A,
        &format!("{}/hook", fx.server.uri()),
        &[EventType::MetricsReportReady],
    );
    fx.store.create_subscription(&sub).unwrap();

    let mut data = Map::new();
    data.insert("report_url".into(), json!("https://reports.test/r/1"));
    let results = fx
        .dispatcher
        .dispatch(BUSINESS_A, EventType::MetricsReportReady, data)
        .await
        .unwrap();
    assert!(!results[0].success());

    let failed = fx.store.list_deliveries(&sub.id, 10).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status_code, Some(500));

    let replayed = replay_delivery(&fx.store, fx.dispatcher.engine(), &fx.log, &failed[0].id)
        .await
        .unwrap();
    assert!(replayed.success());
    assert_eq!(replayed.attempt, 1);

    // Same bytes on the wire, original timestamp included
    let requests = fx.responder.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);

    // The replay is logged as its own record
    let records = fx.store.list_deliveries(&sub.id, 10).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records.iter().filter(|r| r.success).count(), 1);
    assert_eq!(records[0].payload, records[1].payload);
}

#[tokio::test]
async fn test_replay_refuses_inactive_subscription() {
    let fx = failing_then_ok().await;
    let sub = subscription(
        BUSINESS_A,
        &format!("{}/hook", fx.server.uri()),
        &[EventType::BookingCancelled],
    );
    fx.store.create_subscription(&sub).unwrap();

    fx.dispatcher
        .fire_event(BUSINESS_A, EventType::BookingCancelled, Map::new())
        .await;
    let delivery = fx.store.list_deliveries(&sub.id, 1).unwrap().remove(0);

    fx.store.set_active(&sub.id, false).unwrap();

    let err = replay_delivery(&fx.store, fx.dispatcher.engine(), &fx.log, &delivery.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BeaconError::SubscriptionInactive(_)));
    assert_eq!(fx.responder.request_count(), 1);
}

#[tokio::test]
async fn test_replay_unknown_delivery() {
    let fx = failing_then_ok().await;

    let err = replay_delivery(
        &fx.store,
        fx.dispatcher.engine(),
        &fx.log,
        "no-such-delivery",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BeaconError::NotFound(_)));
    assert!(fx.responder.requests().is_empty());
}
