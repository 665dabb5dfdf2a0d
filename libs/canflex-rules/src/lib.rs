//! CANflex Rules - CAN Trigger Rule Engine Library
//!
//! Watches received CAN frames and replays configured frame sequences when a
//! masked pattern is seen often enough within a time window:
//! - Frame codec for hex identifiers, fixed-stride hex payload text and byte arrays
//! - Rule document parsing with load-time validation
//! - Masked matching and windowed debounce per rule
//! - Sequence playback with repeat / gap / hold timing
//! - Optional forwarding of received frames to live observers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │   CanBus    │────▶│  RuleEngine  │────▶│ SequencePlayer │──▶ CanBus
//! │ (poll_frame)│     │ match+count  │     │ repeat/gap/hold│
//! └─────────────┘     └──────────────┘     └────────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐
//!                     │   Observer   │──▶ FrameSink (subscribers)
//!                     └──────────────┘
//! ```

mod bus;
mod clock;
pub mod codec;
mod debounce;
mod engine;
mod error;
pub mod frame;
mod matcher;
mod observer;
mod parser;
mod player;
pub mod types;

// Re-export public API
pub use bus::CanBus;
pub use clock::MonotonicClock;
pub use debounce::{register_hit, RuleState};
pub use engine::{EngineStats, FiredRule, RuleEngine, RuleSetReport, MAX_TRACKED_RULES};
pub use error::{BusError, Result, RuleError, RuleLoadError};
pub use frame::{CanId, Frame, MAX_DLC};
pub use matcher::matches;
pub use observer::{FrameSink, NullSink, ObservedFrameRecord, Observer};
pub use parser::{compile_rule_set, compile_step, parse_rule_set_json};
pub use player::{GapMode, PlaybackReport, SequencePlayer, TransmitFailure};

// Re-export rule types for convenience
pub use types::{
    ActionDocument, ActionSequence, ActionStep, Millis, PayloadSource, Rule, RuleDocument,
    RuleSetDocument, StepDocument, TriggerDocument, TriggerSpec,
};
