//! Shared service library
//!
//! Provides the pieces every service needs at its edges:
//! - logging bootstrap and runtime level control
//! - shutdown signal handling
//! - API response envelopes and the HTTP error type
//! - common CLI arguments and the startup banner

pub mod api_types;
pub mod bootstrap_args;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

// Re-export commonly used API types
pub use api_types::{
    ComponentHealth, ErrorInfo, ErrorResponse, HealthStatus, ServiceStatus, SuccessResponse,
};

#[cfg(feature = "axum")]
pub use api_types::AppError;

pub use bootstrap_args::ServiceArgs;
pub use service_bootstrap::ServiceInfo;

// Re-export CLI dependencies when cli feature is enabled
#[cfg(feature = "cli")]
pub use clap;
