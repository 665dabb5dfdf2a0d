//! CAN Frame Definition
//!
//! Fixed-size frame value used on the hot receive path: identifier, declared
//! length and an 8-byte payload of which the first `len` bytes are significant.

use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};

/// Maximum classic CAN payload length
pub const MAX_DLC: usize = 8;

/// Largest standard (11-bit) identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Largest extended (29-bit) identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// CAN frame identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanId {
    /// Standard 11-bit identifier
    Standard(u16),
    /// Extended 29-bit identifier
    Extended(u32),
}

impl CanId {
    /// Classify a raw identifier: standard when it fits in 11 bits, extended otherwise
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw <= MAX_STANDARD_ID {
            Ok(CanId::Standard(raw as u16))
        } else if raw <= MAX_EXTENDED_ID {
            Ok(CanId::Extended(raw))
        } else {
            Err(RuleError::IdentifierOutOfRange(u64::from(raw)))
        }
    }

    /// Get the raw identifier value
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Standard(id) => u32::from(*id),
            CanId::Extended(id) => *id,
        }
    }

    /// Check if this is an extended identifier
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }
}

/// Immutable CAN frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    id: CanId,
    len: u8,
    data: [u8; MAX_DLC],
}

impl Frame {
    /// Build a frame from a full 8-byte buffer and a declared length
    pub fn new(id: CanId, len: usize, data: [u8; MAX_DLC]) -> Result<Self> {
        if len > MAX_DLC {
            return Err(RuleError::InvalidLength(len as i64));
        }
        Ok(Self {
            id,
            len: len as u8,
            data,
        })
    }

    /// Build a frame from a byte slice (0-8 bytes)
    pub fn from_slice(id: CanId, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_DLC {
            return Err(RuleError::InvalidLength(bytes.len() as i64));
        }
        let mut data = [0u8; MAX_DLC];
        data[..bytes.len()].copy_from_slice(bytes);
        Self::new(id, bytes.len(), data)
    }

    pub fn id(&self) -> CanId {
        self.id
    }

    /// Data length code
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Significant payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Full 8-byte buffer, zero padded past `len`
    pub fn raw_data(&self) -> &[u8; MAX_DLC] {
        &self.data
    }
}
