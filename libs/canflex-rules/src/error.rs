//! Rule Engine Error Types

use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Errors raised while parsing frames and rule definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Identifier, pattern, mask or payload text is not valid hexadecimal
    #[error("Malformed hex: {0}")]
    MalformedHex(String),

    /// Declared length exceeds the data actually supplied
    #[error("Truncated payload: {needed} required, {available} available")]
    TruncatedPayload { needed: usize, available: usize },

    /// Numeric payload element does not fit in a byte
    #[error("Byte out of range at index {index}: {value}")]
    ByteOutOfRange { index: usize, value: i64 },

    /// Frame length outside 0..=8
    #[error("Invalid frame length: {0} (expected 0-8)")]
    InvalidLength(i64),

    /// Debounce threshold must be at least one occurrence
    #[error("Invalid threshold: {0} (expected >= 1)")]
    InvalidThreshold(i64),

    /// Identifier exceeds the 29-bit extended range
    #[error("Identifier out of range: {0:#X}")]
    IdentifierOutOfRange(u64),
}

/// A rule set rejected at load time, pointing at the offending rule and field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid rule {index} at {path}: {source}")]
pub struct RuleLoadError {
    /// Position of the rule in the submitted sequence
    pub index: usize,
    /// JSON-style path of the offending field, e.g. `rules[3].trigger.mask`
    pub path: String,
    #[source]
    pub source: RuleError,
}

impl RuleLoadError {
    pub fn new(index: usize, path: impl Into<String>, source: RuleError) -> Self {
        Self {
            index,
            path: path.into(),
            source,
        }
    }
}

/// Bus interface errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Bus busy, arbitration lost or controller refused the frame
    #[error("Transmit failed: {0}")]
    TransmitFailed(String),

    /// Interface has been shut down
    #[error("Bus closed")]
    Closed,

    /// Driver / socket level error
    #[error("Bus IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        BusError::Io(err.to_string())
    }
}
