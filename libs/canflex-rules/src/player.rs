//! Sequence player
//!
//! Plays an action sequence onto a bus: every step is transmitted `repeat`
//! times with `gap_ms` spacing, then the player holds for `hold_ms` before the
//! next step. Transmit failures are recorded and playback continues.

use crate::bus::CanBus;
use crate::types::ActionStep;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Placement of the inter-repeat gap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapMode {
    /// Gap after every transmission, including the last repeat
    #[default]
    AfterEveryRepeat,
    /// Gap only between consecutive repeats of the same step
    BetweenRepeats,
}

/// One failed transmission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransmitFailure {
    pub step: usize,
    pub attempt: u32,
    pub reason: String,
}

/// Outcome of one playback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    pub steps: usize,
    pub transmitted: u32,
    pub failures: Vec<TransmitFailure>,
    pub cancelled: bool,
}

impl PlaybackReport {
    /// All transmissions accepted and playback ran to the end
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Plays sequences onto one bus
pub struct SequencePlayer {
    bus: Arc<dyn CanBus>,
    gap_mode: GapMode,
}

impl SequencePlayer {
    pub fn new(bus: Arc<dyn CanBus>, gap_mode: GapMode) -> Self {
        Self { bus, gap_mode }
    }

    pub fn gap_mode(&self) -> GapMode {
        self.gap_mode
    }

    /// Play `sequence` in order; returns early if `cancel` fires during a wait
    pub async fn play(&self, sequence: &[ActionStep], cancel: &CancellationToken) -> PlaybackReport {
        let mut report = PlaybackReport {
            steps: sequence.len(),
            ..Default::default()
        };

        for (index, step) in sequence.iter().enumerate() {
            for attempt in 0..step.repeat {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return report;
                }

                match self.bus.transmit(&step.frame).await {
                    Ok(()) => report.transmitted += 1,
                    Err(e) => {
                        warn!(
                            "Transmit failed on {} (step {}, attempt {}): {}",
                            self.bus.name(),
                            index,
                            attempt,
                            e
                        );
                        report.failures.push(TransmitFailure {
                            step: index,
                            attempt,
                            reason: e.to_string(),
                        });
                    },
                }

                let gap_due = match self.gap_mode {
                    GapMode::AfterEveryRepeat => true,
                    GapMode::BetweenRepeats => attempt + 1 < step.repeat,
                };
                if gap_due && !pause(step.gap_ms, cancel).await {
                    report.cancelled = true;
                    return report;
                }
            }

            if !pause(step.hold_ms, cancel).await {
                report.cancelled = true;
                return report;
            }
        }

        debug!(
            "Sequence played: {} steps, {} frames, {} failures",
            report.steps,
            report.transmitted,
            report.failures.len()
        );
        report
    }
}

/// Sleep for `ms`; false if cancelled first
async fn pause(ms: u32, cancel: &CancellationToken) -> bool {
    if ms == 0 {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(u64::from(ms))) => true,
        _ = cancel.cancelled() => false,
    }
}
