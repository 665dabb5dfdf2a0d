//! SocketCAN adapter (Linux)

use async_trait::async_trait;
use canflex_rules::{BusError, CanBus, CanId, Frame};
use socketcan::{
    CanFrame as SocketCanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame as _, Socket,
    StandardId,
};
use std::io::ErrorKind;
use tracing::trace;

/// Non-blocking raw CAN socket
pub struct SocketCanBus {
    interface: String,
    socket: CanSocket,
}

impl SocketCanBus {
    pub fn open(interface: &str) -> Result<Self, BusError> {
        let socket = CanSocket::open(interface)
            .map_err(|e| BusError::Io(format!("open {}: {}", interface, e)))?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            interface: interface.to_string(),
            socket,
        })
    }

    fn to_socket_frame(frame: &Frame) -> Result<SocketCanFrame, BusError> {
        let built = match frame.id() {
            CanId::Standard(id) => {
                StandardId::new(id).and_then(|id| SocketCanFrame::new(id, frame.data()))
            },
            CanId::Extended(id) => {
                ExtendedId::new(id).and_then(|id| SocketCanFrame::new(id, frame.data()))
            },
        };
        built.ok_or_else(|| {
            BusError::TransmitFailed(format!("cannot encode frame {:#X}", frame.id().raw()))
        })
    }

    fn from_socket_frame(frame: &SocketCanFrame) -> Option<Frame> {
        // Remote and error frames carry no payload to match
        if !matches!(frame, SocketCanFrame::Data(_)) {
            return None;
        }
        let id = if frame.is_extended() {
            CanId::Extended(frame.raw_id())
        } else {
            CanId::Standard(frame.raw_id() as u16)
        };
        Frame::from_slice(id, frame.data()).ok()
    }
}

#[async_trait]
impl CanBus for SocketCanBus {
    fn name(&self) -> &str {
        &self.interface
    }

    fn poll_frame(&self) -> Result<Option<Frame>, BusError> {
        match self.socket.read_frame() {
            Ok(frame) => {
                let decoded = Self::from_socket_frame(&frame);
                if decoded.is_none() {
                    trace!("Skipping non-data frame on {}", self.interface);
                }
                Ok(decoded)
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn transmit(&self, frame: &Frame) -> Result<(), BusError> {
        let socket_frame = Self::to_socket_frame(frame)?;
        self.socket.write_frame(&socket_frame).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock => BusError::TransmitFailed("tx queue full".to_string()),
            _ => BusError::Io(e.to_string()),
        })
    }
}
