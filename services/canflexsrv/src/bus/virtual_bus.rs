//! In-process virtual bus

use async_trait::async_trait;
use canflex_rules::{BusError, CanBus, Frame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Transmit history kept for inspection
const TX_HISTORY_LIMIT: usize = 1024;

/// Virtual bus: frames are injected by the host, transmissions are recorded
pub struct VirtualBus {
    name: String,
    loopback: bool,
    pending: Mutex<VecDeque<Frame>>,
    transmitted: Mutex<VecDeque<Frame>>,
    fail_next: AtomicUsize,
    closed: AtomicBool,
}

impl VirtualBus {
    pub fn new(name: impl Into<String>, loopback: bool) -> Self {
        Self {
            name: name.into(),
            loopback,
            pending: Mutex::new(VecDeque::new()),
            transmitted: Mutex::new(VecDeque::new()),
            fail_next: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a frame as if it had arrived from the wire
    pub fn inject(&self, frame: Frame) {
        self.pending.lock().push_back(frame);
    }

    /// Frames transmitted so far (oldest first, bounded history)
    pub fn transmitted(&self) -> Vec<Frame> {
        self.transmitted.lock().iter().copied().collect()
    }

    pub fn clear_transmitted(&self) {
        self.transmitted.lock().clear();
    }

    /// Make the next `count` transmissions fail
    pub fn fail_next_transmits(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CanBus for VirtualBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_frame(&self) -> Result<Option<Frame>, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(self.pending.lock().pop_front())
    }

    async fn transmit(&self, frame: &Frame) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let injected_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected_failure {
            return Err(BusError::TransmitFailed("bus busy".to_string()));
        }

        {
            let mut history = self.transmitted.lock();
            if history.len() == TX_HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(*frame);
        }
        if self.loopback {
            self.inject(*frame);
        }
        Ok(())
    }
}
