//! Service runtime
//!
//! Three cooperating tasks:
//!
//! ```text
//! bus.poll_frame ──▶ [rx queue] ──▶ evaluation worker ──▶ [playback queue] ──▶ playback worker ──▶ bus.transmit
//!   (reception)       bounded        engine lock/frame         bounded          one job at a time
//!                                          │
//!                                          └──▶ FanoutHub (live feed)
//! ```
//!
//! Reception never waits on playback: a full rx queue drops the frame, a full
//! playback queue drops the job. Both are counted.

use crate::config::CanflexConfig;
use crate::error::{CanflexError, Result};
use crate::fanout::FanoutHub;
use canflex_rules::{
    ActionSequence, ActionStep, BusError, CanBus, CanId, EngineStats, Frame, FrameSink, GapMode,
    Millis, MonotonicClock, PlaybackReport, Rule, RuleEngine, RuleSetReport, SequencePlayer,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Identifier of the built-in demo frame
pub const DEMO_ID: u16 = 0x188;

/// Runtime tuning, taken from the service configuration
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub poll_interval: Duration,
    pub rx_queue_capacity: usize,
    pub playback_queue_capacity: usize,
    pub gap_mode: GapMode,
    pub max_tracked_rules: usize,
    pub observe_on_start: bool,
}

impl From<&CanflexConfig> for RuntimeOptions {
    fn from(config: &CanflexConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.bus.poll_interval_ms.max(1)),
            rx_queue_capacity: config.bus.rx_queue_capacity,
            playback_queue_capacity: config.playback.queue_capacity,
            gap_mode: config.playback.gap_mode,
            max_tracked_rules: config.engine.max_tracked_rules,
            observe_on_start: config.engine.observe_on_start,
        }
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::from(&CanflexConfig::default())
    }
}

// ============================================================================
// Counters
// ============================================================================

#[derive(Debug, Default)]
pub struct RuntimeCounters {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    rules_fired: AtomicU64,
    playback_completed: AtomicU64,
    playback_dropped: AtomicU64,
    transmit_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub rules_fired: u64,
    pub playback_completed: u64,
    pub playback_dropped: u64,
    pub transmit_failures: u64,
}

impl RuntimeCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            rules_fired: self.rules_fired.load(Ordering::Relaxed),
            playback_completed: self.playback_completed.load(Ordering::Relaxed),
            playback_dropped: self.playback_dropped.load(Ordering::Relaxed),
            transmit_failures: self.transmit_failures.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

// ============================================================================
// Playback jobs
// ============================================================================

/// Why a sequence is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "rule")]
pub enum PlaybackOrigin {
    Rule(usize),
    OneShot,
    Demo,
}

struct PlaybackJob {
    origin: PlaybackOrigin,
    sequence: ActionSequence,
    reply: Option<oneshot::Sender<PlaybackReport>>,
}

/// Built-in demo: one full-length frame sent twice
pub fn demo_sequence() -> canflex_rules::Result<ActionSequence> {
    let mut data = [0u8; 8];
    data[0] = 0xFF;
    let step = ActionStep {
        frame: Frame::new(CanId::Standard(DEMO_ID), 8, data)?,
        repeat: 2,
        gap_ms: 0,
        hold_ms: 0,
    };
    Ok(Arc::from(vec![step]))
}

// ============================================================================
// Runtime handle
// ============================================================================

/// Snapshot served by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub bus: String,
    pub observation_enabled: bool,
    pub subscribers: usize,
    pub rules_loaded: usize,
    pub rules_monitored: usize,
    pub gap_mode: GapMode,
    pub engine: EngineStats,
    pub counters: CounterSnapshot,
}

/// Cloneable handle to the running workers
#[derive(Clone)]
pub struct Runtime {
    engine: Arc<Mutex<RuleEngine>>,
    hub: FanoutHub,
    bus: Arc<dyn CanBus>,
    clock: MonotonicClock,
    playback_tx: mpsc::Sender<PlaybackJob>,
    counters: Arc<RuntimeCounters>,
    gap_mode: GapMode,
}

impl Runtime {
    /// Spawn reception, evaluation and playback tasks
    ///
    /// All three stop when `cancel` fires; in-flight playback is cancelled
    /// cooperatively.
    pub fn spawn(
        options: RuntimeOptions,
        bus: Arc<dyn CanBus>,
        hub: FanoutHub,
        cancel: CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let engine = RuleEngine::new(options.max_tracked_rules);
        engine.set_observation_enabled(options.observe_on_start);

        let (rx_tx, rx_rx) = mpsc::channel(options.rx_queue_capacity.max(1));
        let (playback_tx, playback_rx) = mpsc::channel(options.playback_queue_capacity.max(1));

        let runtime = Self {
            engine: Arc::new(Mutex::new(engine)),
            hub,
            bus: bus.clone(),
            clock: MonotonicClock::new(),
            playback_tx,
            counters: Arc::new(RuntimeCounters::default()),
            gap_mode: options.gap_mode,
        };

        let reception = tokio::spawn(reception_loop(
            bus.clone(),
            rx_tx,
            runtime.counters.clone(),
            runtime.clock,
            options.poll_interval,
            cancel.clone(),
        ));
        let evaluation = tokio::spawn(evaluation_loop(runtime.clone(), rx_rx, cancel.clone()));
        let playback = tokio::spawn(playback_loop(
            SequencePlayer::new(bus, options.gap_mode),
            playback_rx,
            runtime.counters.clone(),
            cancel,
        ));

        info!(
            "Runtime started on {} (rx queue {}, playback queue {}, gap mode {:?})",
            runtime.bus.name(),
            options.rx_queue_capacity,
            options.playback_queue_capacity,
            options.gap_mode
        );
        (runtime, vec![reception, evaluation, playback])
    }

    /// Swap the active rule set; debounce state restarts from now
    pub fn replace_rules(&self, rules: Vec<Rule>) -> RuleSetReport {
        let now = self.clock.now();
        self.engine.lock().replace_rule_set(rules, now)
    }

    pub fn set_observation(&self, enabled: bool) {
        self.engine.lock().set_observation_enabled(enabled);
        info!("Frame observation {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn observation_enabled(&self) -> bool {
        self.engine.lock().observation_enabled()
    }

    /// Rules that would match `frame`, without affecting debounce state
    pub fn dry_run(&self, frame: &Frame) -> Vec<usize> {
        self.engine.lock().dry_run(frame)
    }

    /// Queue a sequence and wait for its report
    pub async fn play_now(
        &self,
        sequence: ActionSequence,
        origin: PlaybackOrigin,
    ) -> Result<PlaybackReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = PlaybackJob {
            origin,
            sequence,
            reply: Some(reply_tx),
        };

        self.playback_tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                bump(&self.counters.playback_dropped, 1);
                CanflexError::QueueFull
            },
            mpsc::error::TrySendError::Closed(_) => CanflexError::ShuttingDown,
        })?;

        reply_rx.await.map_err(|_| CanflexError::ShuttingDown)
    }

    pub fn hub(&self) -> &FanoutHub {
        &self.hub
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn status(&self) -> RuntimeStatus {
        let engine = self.engine.lock();
        RuntimeStatus {
            bus: self.bus.name().to_string(),
            observation_enabled: engine.observation_enabled(),
            subscribers: self.hub.subscriber_count(),
            rules_loaded: engine.rules().len(),
            rules_monitored: engine.monitored_count(),
            gap_mode: self.gap_mode,
            engine: engine.stats(),
            counters: self.counters.snapshot(),
        }
    }

    fn evaluate(&self, frame: &Frame, ts: Millis) {
        let fired = self.engine.lock().on_frame(frame, ts, &self.hub);

        for rule in fired {
            bump(&self.counters.rules_fired, 1);
            let job = PlaybackJob {
                origin: PlaybackOrigin::Rule(rule.index),
                sequence: rule.action,
                reply: None,
            };
            if let Err(e) = self.playback_tx.try_send(job) {
                bump(&self.counters.playback_dropped, 1);
                warn!("Playback for rule {} dropped: {}", rule.index, e);
            }
        }
    }
}

// ============================================================================
// Workers
// ============================================================================

/// Sleep unless cancelled first; false when cancelled
async fn idle(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

async fn reception_loop(
    bus: Arc<dyn CanBus>,
    queue: mpsc::Sender<(Frame, Millis)>,
    counters: Arc<RuntimeCounters>,
    clock: MonotonicClock,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    debug!("Reception started on {}", bus.name());
    while !cancel.is_cancelled() {
        match bus.poll_frame() {
            Ok(Some(frame)) => {
                bump(&counters.frames_received, 1);
                match queue.try_send((frame, clock.now())) {
                    Ok(()) => {},
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        bump(&counters.frames_dropped, 1);
                        trace!("Rx queue full, frame {:#X} dropped", frame.id().raw());
                    },
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
                tokio::task::yield_now().await;
            },
            Ok(None) => {
                if !idle(poll_interval, &cancel).await {
                    break;
                }
            },
            Err(BusError::Closed) => {
                warn!("Bus {} closed, reception stopped", bus.name());
                break;
            },
            Err(e) => {
                warn!("Receive error on {}: {}", bus.name(), e);
                if !idle(poll_interval, &cancel).await {
                    break;
                }
            },
        }
    }
    debug!("Reception stopped");
}

async fn evaluation_loop(
    runtime: Runtime,
    mut queue: mpsc::Receiver<(Frame, Millis)>,
    cancel: CancellationToken,
) {
    loop {
        let (frame, ts) = tokio::select! {
            _ = cancel.cancelled() => break,
            item = queue.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        runtime.evaluate(&frame, ts);
    }
    debug!("Evaluation stopped");
}

async fn playback_loop(
    player: SequencePlayer,
    mut queue: mpsc::Receiver<PlaybackJob>,
    counters: Arc<RuntimeCounters>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let report = player.play(&job.sequence, &cancel).await;
        bump(&counters.transmit_failures, report.failures.len() as u64);
        bump(&counters.playback_completed, 1);
        debug!(
            "Playback {:?} done: {} frames, {} failures",
            job.origin,
            report.transmitted,
            report.failures.len()
        );

        if let Some(reply) = job.reply {
            let _ = reply.send(report);
        }
    }
    debug!("Playback stopped");
}
