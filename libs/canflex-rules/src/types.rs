//! Rule type definitions
//!
//! Two layers:
//! - Documents: the persisted / submitted JSON shape (`{"rules":[...]}`)
//! - Compiled rules: validated, fixed-size structures evaluated on every frame

use crate::frame::{CanId, Frame, MAX_DLC};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Monotonic milliseconds; wraps, compare only by wrapping difference
pub type Millis = u32;

/// Default debounce threshold
pub const DEFAULT_COUNT: i64 = 1;

/// Default debounce window in milliseconds
pub const DEFAULT_WINDOW_MS: Millis = 500;

// ============================================================================
// Documents
// ============================================================================

/// Payload encoding accepted wherever bytes are configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadSource {
    /// Fixed-stride hex text, e.g. `"FF 00 1A"`
    Text(String),
    /// Integer array, e.g. `[255, 0, 26]`
    Bytes(Vec<i64>),
}

/// Complete rule configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDocument {
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

/// One trigger -> action rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub trigger: TriggerDocument,
    #[serde(default)]
    pub action: ActionDocument,
}

/// Trigger condition as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDocument {
    /// Identifier as hex text
    pub id: String,
    /// Expected byte values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PayloadSource>,
    /// Bits of `data` that take part in the comparison
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<PayloadSource>,
    /// Matches required within the window
    #[serde(default = "default_count")]
    pub count: i64,
    /// Debounce window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: Millis,
    /// Longest frame this trigger can compare; pattern and mask must cover it
    #[serde(default = "default_len")]
    pub len: i64,
}

/// Action played when a rule fires
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDocument {
    #[serde(default)]
    pub sequence: Vec<StepDocument>,
}

/// One outgoing frame with its timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDocument {
    pub id: String,
    #[serde(default = "default_len")]
    pub len: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PayloadSource>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    #[serde(default)]
    pub gap_ms: u32,
    #[serde(default)]
    pub hold_ms: u32,
}

fn default_count() -> i64 {
    DEFAULT_COUNT
}

fn default_window_ms() -> Millis {
    DEFAULT_WINDOW_MS
}

fn default_len() -> i64 {
    MAX_DLC as i64
}

fn default_repeat() -> u32 {
    1
}

// ============================================================================
// Compiled structures
// ============================================================================

/// Validated trigger condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSpec {
    pub id: CanId,
    pub pattern: [u8; MAX_DLC],
    pub mask: [u8; MAX_DLC],
    /// Number of leading bytes for which pattern and mask were supplied
    pub covered: u8,
    pub threshold: u32,
    pub window_ms: Millis,
}

/// Validated outgoing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionStep {
    pub frame: Frame,
    pub repeat: u32,
    pub gap_ms: u32,
    pub hold_ms: u32,
}

/// Shared, immutable action sequence
pub type ActionSequence = Arc<[ActionStep]>;

/// Validated rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub trigger: TriggerSpec,
    pub action: ActionSequence,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_defaults() {
        let doc: RuleSetDocument = serde_json::from_value(json!({
            "rules": [{
                "trigger": { "id": "0x100" },
                "action": { "sequence": [{ "id": "0x200" }] }
            }]
        }))
        .unwrap();

        let trigger = &doc.rules[0].trigger;
        assert_eq!(trigger.count, 1);
        assert_eq!(trigger.window_ms, 500);
        assert_eq!(trigger.len, 8);
        assert!(trigger.data.is_none());

        let step = &doc.rules[0].action.sequence[0];
        assert_eq!(step.len, 8);
        assert_eq!(step.repeat, 1);
        assert_eq!(step.gap_ms, 0);
        assert_eq!(step.hold_ms, 0);
    }

    #[test]
    fn test_payload_source_both_encodings() {
        let text: PayloadSource = serde_json::from_value(json!("FF 00")).unwrap();
        assert_eq!(text, PayloadSource::Text("FF 00".to_string()));

        let bytes: PayloadSource = serde_json::from_value(json!([255, 0])).unwrap();
        assert_eq!(bytes, PayloadSource::Bytes(vec![255, 0]));
    }

    #[test]
    fn test_empty_document() {
        let doc: RuleSetDocument = serde_json::from_value(json!({})).unwrap();
        assert!(doc.rules.is_empty());
    }
}
