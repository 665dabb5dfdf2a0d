//! Service error types

use axum::http::StatusCode;
use canflex_rules::{BusError, RuleError, RuleLoadError};
use common::{AppError, ErrorInfo};
use thiserror::Error;

/// Result type for canflexsrv
pub type Result<T> = std::result::Result<T, CanflexError>;

#[derive(Error, Debug)]
pub enum CanflexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    /// Submitted rule document failed validation
    #[error(transparent)]
    RuleLoad(#[from] RuleLoadError),

    /// Untrusted request field failed validation
    #[error("Invalid {field}: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: RuleError,
    },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Playback queue full")]
    QueueFull,

    #[error("Service shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CanflexError {
    fn from(err: sqlx::Error) -> Self {
        CanflexError::Storage(err.to_string())
    }
}

impl From<figment::Error> for CanflexError {
    fn from(err: figment::Error) -> Self {
        CanflexError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CanflexError {
    fn from(err: std::io::Error) -> Self {
        CanflexError::Internal(err.to_string())
    }
}

impl From<CanflexError> for AppError {
    fn from(err: CanflexError) -> Self {
        match &err {
            CanflexError::RuleLoad(load) => AppError::new(
                StatusCode::BAD_REQUEST,
                ErrorInfo::new(format!("Invalid rule {}", load.index))
                    .with_code(400)
                    .with_details(load.source.to_string())
                    .add_field_error(load.path.clone(), load.source.to_string()),
            ),
            CanflexError::InvalidField { field, source } => {
                AppError::field_error(field.clone(), source.to_string())
            },
            CanflexError::Json(_) => AppError::bad_request("bad json").with_details(err.to_string()),
            CanflexError::QueueFull | CanflexError::ShuttingDown => {
                AppError::service_unavailable(err.to_string())
            },
            CanflexError::Config(_)
            | CanflexError::Storage(_)
            | CanflexError::Bus(_)
            | CanflexError::Internal(_) => AppError::internal_error(err.to_string()),
        }
    }
}
