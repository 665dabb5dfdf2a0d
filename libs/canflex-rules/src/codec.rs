//! Frame codec
//!
//! Textual and numeric payload encodings used by rule documents and the
//! control surface:
//! - identifiers as hex text (`"0x188"`, `"188"`)
//! - payloads as fixed-stride hex text (`"FF 00 1A"`, two digits + one separator per byte)
//! - payloads as integer arrays (`[255, 0, 26]`)
//!
//! Every parser validates the available input before indexing into it.

use crate::error::{Result, RuleError};
use crate::frame::{CanId, MAX_DLC};
use std::fmt::Write;

/// Characters consumed per byte in payload text (two digits + separator)
const TEXT_STRIDE: usize = 3;

/// Parse a hexadecimal identifier with optional `0x` prefix
pub fn parse_identifier(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RuleError::MalformedHex(text.to_string()));
    }

    let significant = digits.trim_start_matches('0');
    if significant.len() > 16 {
        return Err(RuleError::IdentifierOutOfRange(u64::MAX));
    }
    let value = u64::from_str_radix(digits, 16)
        .map_err(|_| RuleError::IdentifierOutOfRange(u64::MAX))?;
    u32::try_from(value).map_err(|_| RuleError::IdentifierOutOfRange(value))
}

/// Parse an identifier and classify it as standard or extended
pub fn parse_can_id(text: &str) -> Result<CanId> {
    CanId::from_raw(parse_identifier(text)?)
}

/// Minimum text length needed to hold `length` bytes
pub fn required_text_len(length: usize) -> usize {
    if length == 0 {
        0
    } else {
        TEXT_STRIDE * length - 1
    }
}

/// Parse `length` bytes of fixed-stride hex text into an 8-byte buffer
///
/// Text past the first `3 * length - 1` characters is ignored.
pub fn parse_payload_text(text: &str, length: usize) -> Result<[u8; MAX_DLC]> {
    if length > MAX_DLC {
        return Err(RuleError::InvalidLength(length as i64));
    }

    let bytes = text.as_bytes();
    let needed = required_text_len(length);
    if bytes.len() < needed {
        return Err(RuleError::TruncatedPayload {
            needed,
            available: bytes.len(),
        });
    }

    let mut out = [0u8; MAX_DLC];
    for (i, slot) in out.iter_mut().enumerate().take(length) {
        let offset = i * TEXT_STRIDE;
        let hi = hex_value(bytes[offset]).ok_or_else(|| malformed(text))?;
        let lo = hex_value(bytes[offset + 1]).ok_or_else(|| malformed(text))?;
        if i + 1 < length && !bytes[offset + 2].is_ascii_whitespace() {
            return Err(malformed(text));
        }
        *slot = (hi << 4) | lo;
    }
    Ok(out)
}

/// Parse a numeric payload array
///
/// Returns the buffer and the effective length, `min(declared, values.len(), 8)`.
pub fn parse_payload_array(values: &[i64], length: usize) -> Result<([u8; MAX_DLC], usize)> {
    let effective = length.min(values.len()).min(MAX_DLC);
    let mut out = [0u8; MAX_DLC];
    for (index, (slot, value)) in out.iter_mut().zip(values).take(effective).enumerate() {
        *slot = u8::try_from(*value).map_err(|_| RuleError::ByteOutOfRange {
            index,
            value: *value,
        })?;
    }
    Ok((out, effective))
}

/// Render `length` bytes as space-separated uppercase hex, no trailing separator
pub fn render_payload_text(payload: &[u8], length: usize) -> String {
    let length = length.min(payload.len()).min(MAX_DLC);
    let mut result = String::with_capacity(required_text_len(length));
    for (i, byte) in payload.iter().take(length).enumerate() {
        if i > 0 {
            result.push(' ');
        }
        // Writing to String buffer is infallible
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn malformed(text: &str) -> RuleError {
    RuleError::MalformedHex(text.to_string())
}
