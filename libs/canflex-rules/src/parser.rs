//! Rule document parser
//!
//! Compiles `RuleSetDocument` JSON into validated `Rule` structures. A rule
//! set is accepted as a whole or rejected at the first invalid field.

use crate::codec::{parse_can_id, parse_payload_array, parse_payload_text};
use crate::error::{RuleError, RuleLoadError};
use crate::frame::{Frame, MAX_DLC};
use crate::types::{
    ActionStep, PayloadSource, Rule, RuleDocument, RuleSetDocument, StepDocument, TriggerDocument,
    TriggerSpec,
};
use std::sync::Arc;

/// Field-level failure before it is placed in a rule path
type FieldResult<T> = std::result::Result<T, (String, RuleError)>;

/// Parse raw JSON text into a rule document
pub fn parse_rule_set_json(text: &str) -> serde_json::Result<RuleSetDocument> {
    serde_json::from_str(text)
}

/// Compile and validate a complete rule set
pub fn compile_rule_set(doc: &RuleSetDocument) -> Result<Vec<Rule>, RuleLoadError> {
    doc.rules
        .iter()
        .enumerate()
        .map(|(index, rule)| {
            compile_rule(rule).map_err(|(field, source)| {
                RuleLoadError::new(index, format!("rules[{}].{}", index, field), source)
            })
        })
        .collect()
}

/// Compile a single step (used for one-shot transmit requests)
pub fn compile_step(doc: &StepDocument) -> Result<ActionStep, RuleLoadError> {
    compile_step_fields(doc).map_err(|(field, source)| RuleLoadError::new(0, field, source))
}

fn compile_rule(doc: &RuleDocument) -> FieldResult<Rule> {
    let trigger = compile_trigger(&doc.trigger).map_err(|(f, e)| (format!("trigger.{}", f), e))?;

    let action = doc
        .action
        .sequence
        .iter()
        .enumerate()
        .map(|(i, step)| {
            compile_step_fields(step)
                .map_err(|(f, e)| (format!("action.sequence[{}].{}", i, f), e))
        })
        .collect::<FieldResult<Vec<_>>>()?;

    Ok(Rule {
        trigger,
        action: Arc::from(action),
    })
}

fn compile_trigger(doc: &TriggerDocument) -> FieldResult<TriggerSpec> {
    let id = parse_can_id(&doc.id).map_err(|e| field("id", e))?;
    let len = checked_len(doc.len).map_err(|e| field("len", e))?;

    if doc.count < 1 {
        return Err(field("count", RuleError::InvalidThreshold(doc.count)));
    }
    let threshold = u32::try_from(doc.count).unwrap_or(u32::MAX);

    let pattern = covering_bytes(doc.data.as_ref(), len).map_err(|e| field("data", e))?;
    let mask = covering_bytes(doc.mask.as_ref(), len).map_err(|e| field("mask", e))?;

    Ok(TriggerSpec {
        id,
        pattern,
        mask,
        covered: len as u8,
        threshold,
        window_ms: doc.window_ms,
    })
}

fn compile_step_fields(doc: &StepDocument) -> FieldResult<ActionStep> {
    let id = parse_can_id(&doc.id).map_err(|e| field("id", e))?;
    let len = checked_len(doc.len).map_err(|e| field("len", e))?;

    let (data, effective) = match &doc.data {
        None => ([0u8; MAX_DLC], len),
        Some(PayloadSource::Text(text)) => {
            (parse_payload_text(text, len).map_err(|e| field("data", e))?, len)
        },
        Some(PayloadSource::Bytes(values)) => {
            parse_payload_array(values, len).map_err(|e| field("data", e))?
        },
    };

    let frame = Frame::new(id, effective, data).map_err(|e| field("len", e))?;

    Ok(ActionStep {
        frame,
        repeat: doc.repeat,
        gap_ms: doc.gap_ms,
        hold_ms: doc.hold_ms,
    })
}

/// Pattern / mask bytes; must supply every position up to `len`
fn covering_bytes(source: Option<&PayloadSource>, len: usize) -> Result<[u8; MAX_DLC], RuleError> {
    match source {
        None => Ok([0u8; MAX_DLC]),
        Some(PayloadSource::Text(text)) => parse_payload_text(text, len),
        Some(PayloadSource::Bytes(values)) => {
            if values.len() < len {
                return Err(RuleError::TruncatedPayload {
                    needed: len,
                    available: values.len(),
                });
            }
            parse_payload_array(values, len).map(|(bytes, _)| bytes)
        },
    }
}

fn checked_len(len: i64) -> Result<usize, RuleError> {
    usize::try_from(len)
        .ok()
        .filter(|l| *l <= MAX_DLC)
        .ok_or(RuleError::InvalidLength(len))
}

fn field(name: &str, err: RuleError) -> (String, RuleError) {
    (name.to_string(), err)
}
