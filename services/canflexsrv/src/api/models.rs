//! Request and response bodies

use canflex_rules::{codec::render_payload_text, Frame, RuleSetReport};
use serde::{Deserialize, Serialize};

/// Response to a rule document replacement
#[derive(Debug, Clone, Serialize)]
pub struct RuleSetUpdate {
    pub report: RuleSetReport,
    /// Present when some rules exceed the tracking capacity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<RuleSetReport> for RuleSetUpdate {
    fn from(report: RuleSetReport) -> Self {
        let warning = (!report.unmonitored.is_empty()).then(|| {
            format!(
                "{} of {} rules exceed the tracking capacity and are not monitored",
                report.unmonitored.len(),
                report.total
            )
        });
        Self { report, warning }
    }
}

/// Frame echoed back in responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameView {
    pub id: u32,
    pub extended: bool,
    pub len: usize,
    pub data: String,
}

impl From<&Frame> for FrameView {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id().raw(),
            extended: frame.id().is_extended(),
            len: frame.len(),
            data: render_payload_text(frame.data(), frame.len()),
        }
    }
}

/// Dry-run outcome
#[derive(Debug, Clone, Serialize)]
pub struct RuleTestResult {
    pub frame: FrameView,
    /// Indices of monitored rules whose trigger matches
    pub matched: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObservationState {
    pub observing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSaved {
    pub name: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLevelResponse {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetLogLevelRequest {
    pub level: String,
}
