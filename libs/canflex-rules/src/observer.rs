//! Frame observer
//!
//! Forwards received frames to live subscribers as compact JSON records. The
//! record is only built when observation is enabled and at least one
//! subscriber is attached.

use crate::codec::render_payload_text;
use crate::frame::Frame;
use crate::types::Millis;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Record pushed to subscribers for every observed frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedFrameRecord {
    /// Receive timestamp (monotonic milliseconds)
    pub ts: Millis,
    /// Raw identifier
    pub id: u32,
    /// Payload as space-separated uppercase hex
    pub data: String,
}

impl ObservedFrameRecord {
    pub fn from_frame(frame: &Frame, ts: Millis) -> Self {
        Self {
            ts,
            id: frame.id().raw(),
            data: render_payload_text(frame.data(), frame.len()),
        }
    }
}

/// Destination for observed frame records
pub trait FrameSink: Send + Sync {
    /// Number of currently attached subscribers
    fn subscriber_count(&self) -> usize;

    /// Deliver one serialized record to every subscriber
    fn broadcast_text(&self, message: String);
}

/// Sink with no subscribers, for contexts without a live channel
pub struct NullSink;

impl FrameSink for NullSink {
    fn subscriber_count(&self) -> usize {
        0
    }

    fn broadcast_text(&self, _message: String) {}
}

/// Observation switch
#[derive(Debug, Default)]
pub struct Observer {
    enabled: AtomicBool,
}

impl Observer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Publish `frame` if observation is on and anyone is listening
    ///
    /// Returns true when a record was delivered to the sink.
    pub fn observe(&self, frame: &Frame, ts: Millis, sink: &dyn FrameSink) -> bool {
        if !self.is_enabled() || sink.subscriber_count() == 0 {
            return false;
        }

        let record = ObservedFrameRecord::from_frame(frame, ts);
        match serde_json::to_string(&record) {
            Ok(text) => {
                sink.broadcast_text(text);
                true
            },
            Err(e) => {
                warn!("Failed to serialize observed frame: {}", e);
                false
            },
        }
    }
}
