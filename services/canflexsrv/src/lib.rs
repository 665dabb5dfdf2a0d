//! CANflex Service
//!
//! Runs the trigger rule engine against a CAN interface and exposes it over
//! HTTP:
//! - rule documents persisted in SQLite and swapped atomically at runtime
//! - one-shot transmission and a built-in demo sequence
//! - live observed-frame feed over WebSocket
//!
//! Reception, evaluation and playback run on separate tasks so timed
//! playback never stalls the bus reader.

pub mod api;
pub mod app;
pub mod bus;
pub mod config;
pub mod error;
pub mod fanout;
pub mod runtime;
pub mod storage;

pub use app::{create_app_state, AppState, ServiceHandle};
pub use config::CanflexConfig;
pub use error::{CanflexError, Result};
