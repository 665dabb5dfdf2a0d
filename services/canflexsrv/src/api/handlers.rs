//! Control surface handlers
//!
//! Untrusted bodies are taken as raw text and parsed here so malformed JSON
//! and field validation failures map to the same 400 envelope.

use crate::api::models::{
    DocumentSaved, LogLevelResponse, ObservationState, RuleSetUpdate, RuleTestResult,
    SetLogLevelRequest,
};
use crate::app::AppState;
use crate::error::CanflexError;
use crate::runtime::{demo_sequence, PlaybackOrigin};
use crate::storage::{NOTES_DOC, RULES_DOC, USERDB_DOC};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
};
use canflex_rules::{
    compile_rule_set, compile_step, parse_rule_set_json, ActionStep, PlaybackReport, StepDocument,
};
use common::{AppError, ComponentHealth, HealthStatus, ServiceStatus, SuccessResponse};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

type ApiResult<T> = Result<Json<SuccessResponse<T>>, AppError>;

const EMPTY_RULE_SET: &str = "{\"rules\":[]}";

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, AppError> {
    serde_json::from_str(body).map_err(|e| CanflexError::from(e).into())
}

/// Step compile errors name the request field, not a rule path
fn compile_request_step(doc: &StepDocument) -> Result<ActionStep, AppError> {
    compile_step(doc).map_err(|e| {
        CanflexError::InvalidField {
            field: e.path,
            source: e.source,
        }
        .into()
    })
}

fn json_text(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

// ============================================================================
// Health and status
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthStatus> {
    let mut checks = HashMap::new();

    let storage = match state.store.ping().await {
        Ok(()) => ComponentHealth::healthy(),
        Err(e) => ComponentHealth::with_status(ServiceStatus::Unhealthy, e.to_string()),
    };
    checks.insert("storage".to_string(), storage);

    let counters = state.runtime.counters();
    let playback = if counters.transmit_failures > 0 {
        ComponentHealth::with_status(
            ServiceStatus::Degraded,
            format!("{} transmit failures", counters.transmit_failures),
        )
    } else {
        ComponentHealth::healthy()
    };
    checks.insert("playback".to_string(), playback);

    let status = if checks.values().any(|c| c.status == ServiceStatus::Unhealthy) {
        ServiceStatus::Unhealthy
    } else if checks.values().any(|c| c.status == ServiceStatus::Degraded) {
        ServiceStatus::Degraded
    } else {
        ServiceStatus::Healthy
    };

    Ok(Json(SuccessResponse::new(HealthStatus {
        status,
        service: crate::config::SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: chrono::Utc::now(),
        checks,
    })))
}

pub async fn service_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<crate::runtime::RuntimeStatus> {
    Ok(Json(
        SuccessResponse::new(state.runtime.status())
            .with_metadata("uptime_seconds", state.uptime_seconds().into()),
    ))
}

// ============================================================================
// Rule document
// ============================================================================

/// Current rule document, pretty-printed
pub async fn get_rule_config(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let body = match state.store.get(RULES_DOC).await? {
        Some(doc) => serde_json::from_str::<serde_json::Value>(&doc.body)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or(doc.body),
        None => EMPTY_RULE_SET.to_string(),
    };
    Ok(json_text(body))
}

/// Validate, persist, then swap in a new rule document
pub async fn replace_rule_config(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<RuleSetUpdate> {
    let doc = parse_rule_set_json(&body).map_err(CanflexError::from)?;
    let rules = compile_rule_set(&doc).map_err(CanflexError::from)?;

    // Live rules only change once the document is stored
    let _guard = state.config_update.lock().await;
    state.store.put(RULES_DOC, &body).await?;
    let report = state.runtime.replace_rules(rules);

    info!(
        "Rule set replaced: {} rules, {} monitored",
        report.total, report.monitored
    );
    let update = RuleSetUpdate::from(report);
    if let Some(warning) = &update.warning {
        warn!("{}", warning);
    }
    Ok(Json(SuccessResponse::new(update)))
}

// ============================================================================
// Opaque documents
// ============================================================================

pub async fn get_userdb(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let body = state
        .store
        .get(USERDB_DOC)
        .await?
        .map(|doc| doc.body)
        .unwrap_or_else(|| "{}".to_string());
    Ok(json_text(body))
}

pub async fn save_userdb(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<DocumentSaved> {
    parse_body::<serde_json::Value>(&body)?;
    state.store.put(USERDB_DOC, &body).await?;
    Ok(Json(SuccessResponse::new(DocumentSaved {
        name: USERDB_DOC.to_string(),
        bytes: body.len(),
    })))
}

pub async fn get_notes(State(state): State<Arc<AppState>>) -> Result<String, AppError> {
    Ok(state
        .store
        .get(NOTES_DOC)
        .await?
        .map(|doc| doc.body)
        .unwrap_or_default())
}

pub async fn save_notes(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<DocumentSaved> {
    state.store.put(NOTES_DOC, &body).await?;
    Ok(Json(SuccessResponse::new(DocumentSaved {
        name: NOTES_DOC.to_string(),
        bytes: body.len(),
    })))
}

// ============================================================================
// Transmission
// ============================================================================

/// Send one step now, through the playback queue
pub async fn transmit_once(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<PlaybackReport> {
    let doc: StepDocument = parse_body(&body)?;
    let step = compile_request_step(&doc)?;
    debug!(
        "One-shot transmit {:#X} x{}",
        step.frame.id().raw(),
        step.repeat
    );

    let report = state
        .runtime
        .play_now(Arc::from(vec![step]), PlaybackOrigin::OneShot)
        .await?;
    Ok(Json(SuccessResponse::new(report)))
}

pub async fn run_demo(State(state): State<Arc<AppState>>) -> ApiResult<PlaybackReport> {
    let sequence = demo_sequence().map_err(|e| CanflexError::Internal(e.to_string()))?;
    let report = state
        .runtime
        .play_now(sequence, PlaybackOrigin::Demo)
        .await?;
    Ok(Json(SuccessResponse::new(report)))
}

// ============================================================================
// Observation
// ============================================================================

pub async fn start_observation(State(state): State<Arc<AppState>>) -> ApiResult<ObservationState> {
    state.runtime.set_observation(true);
    Ok(Json(SuccessResponse::new(ObservationState { observing: true })))
}

pub async fn stop_observation(State(state): State<Arc<AppState>>) -> ApiResult<ObservationState> {
    state.runtime.set_observation(false);
    Ok(Json(SuccessResponse::new(ObservationState { observing: false })))
}

// ============================================================================
// Tools
// ============================================================================

/// Match a frame against the active rules without touching debounce state
pub async fn test_rules(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<RuleTestResult> {
    let doc: StepDocument = parse_body(&body)?;
    let frame = compile_request_step(&doc)?.frame;
    let matched = state.runtime.dry_run(&frame);
    Ok(Json(SuccessResponse::new(RuleTestResult {
        frame: (&frame).into(),
        matched,
    })))
}

pub async fn get_log_level() -> ApiResult<LogLevelResponse> {
    Ok(Json(SuccessResponse::new(LogLevelResponse {
        level: common::logging::get_log_level(),
    })))
}

pub async fn set_log_level(Json(request): Json<SetLogLevelRequest>) -> ApiResult<LogLevelResponse> {
    common::logging::set_log_level(&request.level).map_err(AppError::bad_request)?;
    Ok(Json(SuccessResponse::new(LogLevelResponse {
        level: request.level,
    })))
}
