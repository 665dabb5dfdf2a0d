//! HTTP control surface tests
//!
//! Drive the router with `oneshot` against an in-memory document store and a
//! virtual bus.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use canflex_rules::{CanId, Frame};
use canflexsrv::{
    api::create_routes,
    app::{AppState, ServiceHandle},
    bus::{OpenedBus, VirtualBus},
    config::CanflexConfig,
    storage::{DocumentStore, RULES_DOC},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

struct TestApp {
    service: ServiceHandle,
    bus: Arc<VirtualBus>,
    cancel: CancellationToken,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_store(DocumentStore::in_memory().await.unwrap()).await
    }

    async fn with_store(store: DocumentStore) -> Self {
        let bus = Arc::new(VirtualBus::new("test", false));
        let opened = OpenedBus {
            bus: bus.clone(),
            virtual_bus: Some(bus.clone()),
        };
        let cancel = CancellationToken::new();
        let service =
            AppState::build(CanflexConfig::default(), store, opened, cancel.clone()).await;
        Self {
            service,
            bus,
            cancel,
        }
    }

    fn router(&self) -> Router {
        create_routes(self.service.state.clone())
    }

    async fn send(&self, method: Method, uri: &str, body: impl Into<String>) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.into()))
            .unwrap();
        let resp = self.router().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.send(Method::GET, uri, "").await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn post_json(&self, uri: &str, body: impl Into<String>) -> (StatusCode, Value) {
        let (status, body) = self.send(Method::POST, uri, body).await;
        (status, serde_json::from_str(&body).unwrap())
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn single_rule(id: &str, count: i64) -> Value {
    json!({
        "rules": [{
            "trigger": {
                "id": id,
                "data": "01 00 00 00 00 00 00 00",
                "mask": "FF 00 00 00 00 00 00 00",
                "count": count,
                "window_ms": 500
            },
            "action": { "sequence": [
                { "id": "0x188", "len": 2, "data": "AA 55", "repeat": 1 }
            ]}
        }]
    })
}

async fn wait_for_transmissions(bus: &VirtualBus, expected: usize) -> Vec<Frame> {
    for _ in 0..200 {
        let sent = bus.transmitted();
        if sent.len() >= expected {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bus.transmitted()
}

#[tokio::test]
async fn test_health_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["service"], "canflexsrv");
    assert_eq!(body["data"]["checks"]["storage"]["status"], "healthy");
}

#[tokio::test]
async fn test_status_reports_runtime() {
    let app = TestApp::new().await;
    let (status, body) = app.get_json("/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bus"], "test");
    assert_eq!(body["data"]["observation_enabled"], true);
    assert_eq!(body["data"]["rules_loaded"], 0);
    assert_eq!(body["data"]["counters"]["frames_received"], 0);
    assert!(body["metadata"]["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_cfg_empty_by_default() {
    let app = TestApp::new().await;
    let (status, body) = app.get_json("/cfg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"rules": []}));
}

#[tokio::test]
async fn test_cfg_rejects_malformed_json() {
    let app = TestApp::new().await;
    let (status, body) = app.post_json("/cfg", "{ rules: [").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["message"], "bad json");

    // Nothing was stored
    let (_, cfg) = app.get_json("/cfg").await;
    assert_eq!(cfg, json!({"rules": []}));
}

#[tokio::test]
async fn test_cfg_rejects_invalid_rule_with_field_path() {
    let app = TestApp::new().await;
    let doc = json!({
        "rules": [
            { "trigger": { "id": "0x100" } },
            { "trigger": { "id": "0x101", "data": "FF 00", "mask": "FF FF" } }
        ]
    });
    let (status, body) = app.post_json("/cfg", doc.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid rule 1");
    assert!(body["error"]["field_errors"]["rules[1].trigger.data"].is_array());
}

#[tokio::test]
async fn test_cfg_invalid_replacement_keeps_previous_rules() {
    let app = TestApp::new().await;
    let good = single_rule("0x3C0", 1);
    let (status, _) = app.post_json("/cfg", good.to_string()).await;
    assert_eq!(status, StatusCode::OK);

    let bad = json!({ "rules": [{ "trigger": { "id": "zz" } }] });
    let (status, _) = app.post_json("/cfg", bad.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, cfg) = app.get_json("/cfg").await;
    assert_eq!(cfg, good);
    let (_, status) = app.get_json("/api/status").await;
    assert_eq!(status["data"]["rules_loaded"], 1);
}

#[tokio::test]
async fn test_cfg_round_trip_and_pretty_print() {
    let app = TestApp::new().await;
    let doc = single_rule("0x3C0", 2);
    let (status, body) = app.post_json("/cfg", doc.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["report"]["total"], 1);
    assert_eq!(body["data"]["report"]["monitored"], 1);
    assert!(body["data"]["warning"].is_null());

    let (status, text) = app.send(Method::GET, "/cfg", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains('\n'));
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), doc);
}

#[tokio::test]
async fn test_cfg_over_capacity_warns() {
    let app = TestApp::new().await;
    let rules: Vec<Value> = (0..34)
        .map(|i| json!({ "trigger": { "id": format!("0x{:X}", 0x100 + i) } }))
        .collect();
    let (status, body) = app
        .post_json("/cfg", json!({ "rules": rules }).to_string())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["report"]["monitored"], 32);
    assert_eq!(body["data"]["report"]["unmonitored"], json!([32, 33]));
    assert!(body["data"]["warning"].as_str().unwrap().contains("not monitored"));
}

#[tokio::test]
async fn test_stored_rules_restored_on_start() {
    let store = DocumentStore::in_memory().await.unwrap();
    store
        .put(RULES_DOC, &single_rule("0x3C0", 1).to_string())
        .await
        .unwrap();

    let app = TestApp::with_store(store).await;
    let (_, status) = app.get_json("/api/status").await;
    assert_eq!(status["data"]["rules_loaded"], 1);
}

#[tokio::test]
async fn test_userdb_round_trip() {
    let app = TestApp::new().await;
    let (_, empty) = app.get_json("/userdb").await;
    assert_eq!(empty, json!({}));

    let doc = json!({ "vehicles": [{ "name": "test", "vin": "X" }] });
    let (status, body) = app.post_json("/userdb", doc.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "userdb");

    let (_, stored) = app.get_json("/userdb").await;
    assert_eq!(stored, doc);
}

#[tokio::test]
async fn test_userdb_rejects_malformed_json() {
    let app = TestApp::new().await;
    let (status, body) = app.post_json("/userdb", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "bad json");
}

#[tokio::test]
async fn test_notes_round_trip() {
    let app = TestApp::new().await;
    let (status, text) = app.send(Method::GET, "/notes", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "");

    let (status, _) = app.send(Method::POST, "/notes", "0x3C0 = door lock\n").await;
    assert_eq!(status, StatusCode::OK);

    let (_, text) = app.send(Method::GET, "/notes", "").await;
    assert_eq!(text, "0x3C0 = door lock\n");
}

#[tokio::test]
async fn test_tx_sends_frame() {
    let app = TestApp::new().await;
    let step = json!({ "id": "0x7E0", "len": 3, "data": [2, 1, 0], "repeat": 2 });
    let (status, body) = app.post_json("/tx", step.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transmitted"], 2);
    assert_eq!(body["data"]["failures"], json!([]));

    let sent = app.bus.transmitted();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].id(), CanId::Standard(0x7E0));
    assert_eq!(sent[0].data(), &[2, 1, 0]);
}

#[tokio::test]
async fn test_tx_reports_transmit_failure() {
    let app = TestApp::new().await;
    app.bus.fail_next_transmits(1);
    let step = json!({ "id": "0x7E0", "len": 1, "data": "01", "repeat": 2 });
    let (status, body) = app.post_json("/tx", step.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transmitted"], 1);
    assert_eq!(body["data"]["failures"][0]["step"], 0);
    assert_eq!(body["data"]["failures"][0]["attempt"], 0);
}

#[tokio::test]
async fn test_tx_rejects_invalid_step() {
    let app = TestApp::new().await;

    let (status, body) = app.post_json("/tx", r#"{"id":"0x7E0","len":9}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["field_errors"]["len"].is_array());

    let (status, body) = app
        .post_json("/tx", r#"{"id":"0x7E0","len":4,"data":"00"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["field_errors"]["data"].is_array());

    let (status, body) = app.post_json("/tx", "{").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "bad json");

    assert!(app.bus.transmitted().is_empty());
}

#[tokio::test]
async fn test_show_plays_demo() {
    let app = TestApp::new().await;
    let (status, body) = app.post_json("/show", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transmitted"], 2);

    let sent = app.bus.transmitted();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|f| f.id() == CanId::Standard(0x188)));
    assert_eq!(sent[0].data(), &[0xFF, 0, 0, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn test_sniff_toggle() {
    let app = TestApp::new().await;
    let (status, body) = app.post_json("/sniff/stop", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["observing"], false);
    let (_, status_body) = app.get_json("/api/status").await;
    assert_eq!(status_body["data"]["observation_enabled"], false);

    let (_, body) = app.post_json("/sniff/start", "").await;
    assert_eq!(body["data"]["observing"], true);
    let (_, status_body) = app.get_json("/api/status").await;
    assert_eq!(status_body["data"]["observation_enabled"], true);
}

#[tokio::test]
async fn test_rule_dry_run() {
    let app = TestApp::new().await;
    app.post_json("/cfg", single_rule("0x3C0", 3).to_string()).await;

    let (status, body) = app
        .post_json(
            "/api/rules/test",
            r#"{"id":"0x3C0","data":"01 FF FF FF FF FF FF FF"}"#,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], json!([0]));
    assert_eq!(body["data"]["frame"]["data"], "01 FF FF FF FF FF FF FF");

    let (_, body) = app
        .post_json("/api/rules/test", r#"{"id":"0x3C0","data":"02 00 00 00 00 00 00 00"}"#)
        .await;
    assert_eq!(body["data"]["matched"], json!([]));

    // Dry runs never fire
    assert!(app.bus.transmitted().is_empty());
}

#[tokio::test]
async fn test_failed_save_keeps_live_rules() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post_json("/cfg", single_rule("0x3C0", 3).to_string())
        .await;
    assert_eq!(status, StatusCode::OK);

    app.service.state.store.close().await;
    let (status, body) = app
        .post_json("/cfg", single_rule("0x3C1", 3).to_string())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    // Running rules still match what was last stored
    let (_, body) = app
        .post_json("/api/rules/test", r#"{"id":"0x3C0","data":"01 00 00 00 00 00 00 00"}"#)
        .await;
    assert_eq!(body["data"]["matched"], json!([0]));
    let (_, body) = app
        .post_json("/api/rules/test", r#"{"id":"0x3C1","data":"01 00 00 00 00 00 00 00"}"#)
        .await;
    assert_eq!(body["data"]["matched"], json!([]));
}

#[tokio::test]
async fn test_log_level_endpoint() {
    let app = TestApp::new().await;
    let (status, body) = app.get_json("/api/log-level").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["level"].is_string());
}

#[tokio::test]
async fn test_matching_frames_fire_rule() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post_json("/cfg", single_rule("0x3C0", 2).to_string())
        .await;
    assert_eq!(status, StatusCode::OK);

    let trigger = Frame::from_slice(CanId::Standard(0x3C0), &[1, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    app.bus.inject(trigger);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(app.bus.transmitted().is_empty());

    app.bus.inject(trigger);
    let sent = wait_for_transmissions(&app.bus, 1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id(), CanId::Standard(0x188));
    assert_eq!(sent[0].data(), &[0xAA, 0x55]);

    let (_, status) = app.get_json("/api/status").await;
    assert_eq!(status["data"]["counters"]["rules_fired"], 1);
    assert_eq!(status["data"]["counters"]["frames_received"], 2);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new().await;
    let (status, _) = app.send(Method::GET, "/nope", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
