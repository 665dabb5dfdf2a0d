//! Debounce tracker - per-rule occurrence counting over a time window
//!
//! Timestamps are wrapping monotonic milliseconds; elapsed time is always the
//! wrapping difference `now - window_start`, so counter wraparound is harmless.

use crate::types::Millis;

/// Transient per-rule state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleState {
    pub hit_count: u32,
    pub window_start: Millis,
}

impl RuleState {
    pub fn new(now: Millis) -> Self {
        Self {
            hit_count: 0,
            window_start: now,
        }
    }

    pub fn reset(&mut self, now: Millis) {
        *self = Self::new(now);
    }

    /// IDLE when no hits are pending in the current window
    pub fn is_idle(&self) -> bool {
        self.hit_count == 0
    }
}

/// Register one matching frame; returns true when the threshold is reached
///
/// The window is anchored at load or at the last fire; only an elapsed
/// window restarts it at `now` before counting. Firing clears the counter and
/// re-anchors the window at `now`.
pub fn register_hit(state: &mut RuleState, now: Millis, threshold: u32, window: Millis) -> bool {
    if now.wrapping_sub(state.window_start) > window {
        state.reset(now);
    }

    state.hit_count = state.hit_count.saturating_add(1);
    if state.hit_count >= threshold {
        state.reset(now);
        true
    } else {
        false
    }
}
