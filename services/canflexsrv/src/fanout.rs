//! Live frame feed hub
//!
//! Broadcast channel of serialized frame records. Slow subscribers lag and
//! skip messages instead of holding up the evaluation worker.

use canflex_rules::FrameSink;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct FanoutHub {
    sender: broadcast::Sender<Arc<str>>,
}

impl FanoutHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.sender.subscribe()
    }
}

impl FrameSink for FanoutHub {
    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn broadcast_text(&self, message: String) {
        // No receivers is not an error for a best-effort feed
        let _ = self.sender.send(Arc::from(message));
    }
}
