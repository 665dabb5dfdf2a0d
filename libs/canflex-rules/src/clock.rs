//! Monotonic millisecond clock

use crate::types::Millis;
use tokio::time::Instant;

/// Wrapping millisecond counter measured from construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since construction, truncated to 32 bits
    pub fn now(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
