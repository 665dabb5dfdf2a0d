//! Bus adapters
//!
//! - `virtual`: in-process bus for running without hardware and for tests
//! - `socketcan`: Linux SocketCAN interface (cargo feature `socketcan`)

mod virtual_bus;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
mod socketcan_bus;

pub use virtual_bus::VirtualBus;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan_bus::SocketCanBus;

use crate::config::{BusConfig, BusKind};
use crate::error::{CanflexError, Result};
use canflex_rules::CanBus;
use std::sync::Arc;
use tracing::info;

/// Opened bus plus the injection handle when it is virtual
pub struct OpenedBus {
    pub bus: Arc<dyn CanBus>,
    pub virtual_bus: Option<Arc<VirtualBus>>,
}

pub fn open_bus(config: &BusConfig) -> Result<OpenedBus> {
    match config.kind {
        BusKind::Virtual => {
            let bus = Arc::new(VirtualBus::new("vcan", config.loopback));
            info!("Using virtual bus (loopback: {})", config.loopback);
            Ok(OpenedBus {
                bus: bus.clone(),
                virtual_bus: Some(bus),
            })
        },
        BusKind::Socketcan => open_socketcan(&config.interface),
    }
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn open_socketcan(interface: &str) -> Result<OpenedBus> {
    let bus = SocketCanBus::open(interface)?;
    info!("SocketCAN interface {} opened", interface);
    Ok(OpenedBus {
        bus: Arc::new(bus),
        virtual_bus: None,
    })
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn open_socketcan(interface: &str) -> Result<OpenedBus> {
    Err(CanflexError::Config(format!(
        "bus.kind = socketcan ({}) requires a Linux build with the `socketcan` feature",
        interface
    )))
}
