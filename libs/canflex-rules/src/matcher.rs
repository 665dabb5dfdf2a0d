//! Rule matcher - masked byte comparison of one frame against one trigger

use crate::frame::Frame;
use crate::types::TriggerSpec;

/// Check whether `frame` satisfies `trigger`
///
/// Identifiers must be equal; then every byte below the frame's declared
/// length must agree with the pattern on the bits selected by the mask. A
/// frame longer than the trigger's covered length never matches.
pub fn matches(frame: &Frame, trigger: &TriggerSpec) -> bool {
    if frame.id() != trigger.id {
        return false;
    }

    let len = frame.len();
    if len > usize::from(trigger.covered) {
        return false;
    }

    let data = frame.raw_data();
    (0..len).all(|i| (data[i] & trigger.mask[i]) == (trigger.pattern[i] & trigger.mask[i]))
}
