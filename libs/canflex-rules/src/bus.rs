//! Bus interface abstraction
//!
//! The engine and the sequence player only see this trait; hardware drivers
//! and the in-process virtual bus live in the service crate.

use crate::error::BusError;
use crate::frame::Frame;
use async_trait::async_trait;

#[async_trait]
pub trait CanBus: Send + Sync {
    /// Interface name for logging
    fn name(&self) -> &str;

    /// Non-blocking receive; `Ok(None)` when nothing is pending
    fn poll_frame(&self) -> Result<Option<Frame>, BusError>;

    /// Queue one frame for transmission
    async fn transmit(&self, frame: &Frame) -> Result<(), BusError>;
}
