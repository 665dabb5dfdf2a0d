//! Runtime worker tests on the virtual bus

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use canflex_rules::{
    compile_rule_set, compile_step, ActionSequence, CanId, Frame, Rule, RuleSetDocument,
    StepDocument,
};
use canflexsrv::{
    bus::VirtualBus,
    error::CanflexError,
    fanout::FanoutHub,
    runtime::{PlaybackOrigin, Runtime, RuntimeOptions},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Started = (Runtime, Arc<VirtualBus>, CancellationToken, Vec<JoinHandle<()>>);

fn start(options: RuntimeOptions) -> Started {
    let bus = Arc::new(VirtualBus::new("vtest", false));
    let cancel = CancellationToken::new();
    let (runtime, tasks) =
        Runtime::spawn(options, bus.clone(), FanoutHub::new(64), cancel.clone());
    (runtime, bus, cancel, tasks)
}

fn rules(value: serde_json::Value) -> Vec<Rule> {
    let doc: RuleSetDocument = serde_json::from_value(value).unwrap();
    compile_rule_set(&doc).unwrap()
}

fn trigger_frame() -> Frame {
    Frame::from_slice(CanId::Standard(0x3C0), &[0, 0, 0x10, 0, 0, 0, 0, 0]).unwrap()
}

fn rule_doc(count: i64, window_ms: u32, hold_ms: u32) -> serde_json::Value {
    json!({
        "rules": [{
            "trigger": {
                "id": "0x3C0",
                "data": [0, 0, 0x10, 0, 0, 0, 0, 0],
                "mask": [0, 0, 0xF0, 0, 0, 0, 0, 0],
                "count": count,
                "window_ms": window_ms
            },
            "action": { "sequence": [
                { "id": "0x188", "len": 1, "data": "AA", "hold_ms": hold_ms }
            ]}
        }]
    })
}

async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    done()
}

#[tokio::test]
async fn test_threshold_within_window_fires_once() {
    let (runtime, bus, cancel, _) = start(RuntimeOptions::default());
    runtime.replace_rules(rules(rule_doc(3, 2_000, 0)));

    for _ in 0..3 {
        bus.inject(trigger_frame());
    }
    assert!(wait_until(|| bus.transmitted().len() == 1).await);

    // Counter restarted after firing: two more hits are not enough
    bus.inject(trigger_frame());
    bus.inject(trigger_frame());
    assert!(wait_until(|| runtime.counters().frames_received == 5).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(bus.transmitted().len(), 1);
    assert_eq!(runtime.counters().rules_fired, 1);

    cancel.cancel();
}

#[tokio::test]
async fn test_window_expiry_resets_count() {
    let (runtime, bus, cancel, _) = start(RuntimeOptions::default());
    runtime.replace_rules(rules(rule_doc(2, 40, 0)));

    bus.inject(trigger_frame());
    assert!(wait_until(|| runtime.status().engine.matches == 1).await);
    tokio::time::sleep(Duration::from_millis(120)).await;

    bus.inject(trigger_frame());
    assert!(wait_until(|| runtime.status().engine.matches == 2).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(bus.transmitted().is_empty());

    cancel.cancel();
}

#[tokio::test]
async fn test_reception_continues_during_playback() {
    let (runtime, bus, cancel, _) = start(RuntimeOptions::default());
    runtime.replace_rules(rules(rule_doc(1, 500, 300)));

    bus.inject(trigger_frame());
    assert!(wait_until(|| bus.transmitted().len() == 1).await);

    // Playback is holding; reception and evaluation keep running
    let other = Frame::from_slice(CanId::Standard(0x100), &[1]).unwrap();
    for _ in 0..5 {
        bus.inject(other);
    }
    assert!(wait_until(|| runtime.status().engine.frames_evaluated == 6).await);
    assert_eq!(runtime.counters().playback_completed, 0);

    cancel.cancel();
}

#[tokio::test]
async fn test_replace_rules_resets_state() {
    let (runtime, bus, cancel, _) = start(RuntimeOptions::default());
    let doc = rule_doc(2, 2_000, 0);
    runtime.replace_rules(rules(doc.clone()));

    bus.inject(trigger_frame());
    assert!(wait_until(|| runtime.status().engine.matches == 1).await);

    // A pending hit must not carry over into the new rule set
    runtime.replace_rules(rules(doc));
    bus.inject(trigger_frame());
    assert!(wait_until(|| runtime.status().engine.matches == 2).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(bus.transmitted().is_empty());

    cancel.cancel();
}

#[tokio::test]
async fn test_observed_frames_reach_subscribers() {
    let (runtime, bus, cancel, _) = start(RuntimeOptions::default());
    let mut feed = runtime.hub().subscribe();

    bus.inject(Frame::from_slice(CanId::Standard(0x123), &[0xDE, 0xAD]).unwrap());
    let message = tokio::time::timeout(Duration::from_secs(2), feed.recv())
        .await
        .unwrap()
        .unwrap();
    let record: serde_json::Value = serde_json::from_str(&message).unwrap();
    assert_eq!(record["id"], 0x123);
    assert_eq!(record["data"], "DE AD");
    assert!(record["ts"].is_u64());

    runtime.set_observation(false);
    bus.inject(Frame::from_slice(CanId::Standard(0x124), &[1]).unwrap());
    assert!(wait_until(|| runtime.status().engine.frames_evaluated == 2).await);
    assert!(feed.try_recv().is_err());

    cancel.cancel();
}

#[tokio::test]
async fn test_playback_queue_full() {
    let options = RuntimeOptions {
        playback_queue_capacity: 1,
        ..RuntimeOptions::default()
    };
    let (runtime, _bus, cancel, _) = start(options);

    let step: StepDocument =
        serde_json::from_value(json!({ "id": "0x188", "len": 0, "hold_ms": 500 })).unwrap();
    let slow: ActionSequence = Arc::from(vec![compile_step(&step).unwrap()]);

    // First job occupies the worker, second fills the queue
    let first = tokio::spawn({
        let runtime = runtime.clone();
        let slow = Arc::clone(&slow);
        async move { runtime.play_now(slow, PlaybackOrigin::OneShot).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = tokio::spawn({
        let runtime = runtime.clone();
        let slow = Arc::clone(&slow);
        async move { runtime.play_now(slow, PlaybackOrigin::OneShot).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let third = runtime.play_now(slow, PlaybackOrigin::OneShot).await;
    assert!(matches!(third, Err(CanflexError::QueueFull)));
    assert_eq!(runtime.counters().playback_dropped, 1);

    cancel.cancel();
    let _ = first.await;
    let _ = second.await;
}

#[tokio::test]
async fn test_shutdown_stops_workers() {
    let (runtime, _bus, cancel, tasks) = start(RuntimeOptions::default());
    cancel.cancel();

    let joined = tokio::time::timeout(Duration::from_secs(2), futures::future::join_all(tasks)).await;
    assert!(joined.is_ok());

    let step: StepDocument = serde_json::from_value(json!({ "id": "0x1", "len": 0 })).unwrap();
    let result = runtime
        .play_now(Arc::from(vec![compile_step(&step).unwrap()]), PlaybackOrigin::OneShot)
        .await;
    assert!(matches!(result, Err(CanflexError::ShuttingDown)));
}

#[tokio::test]
async fn test_closed_bus_stops_reception() {
    let (runtime, bus, cancel, mut tasks) = start(RuntimeOptions::default());
    bus.close();

    // Reception is the first task
    let reception = tasks.remove(0);
    assert!(tokio::time::timeout(Duration::from_secs(2), reception).await.is_ok());
    assert_eq!(runtime.counters().frames_received, 0);

    cancel.cancel();
}
