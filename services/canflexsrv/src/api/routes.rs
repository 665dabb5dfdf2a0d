//! API route table

use crate::api::{handlers, websocket};
use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

/// Create all API routes with state
pub fn create_routes(state: Arc<AppState>) -> Router {
    let mut router: Router<Arc<AppState>> = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/status", get(handlers::service_status))
        // Persisted documents
        .route(
            "/cfg",
            get(handlers::get_rule_config).post(handlers::replace_rule_config),
        )
        .route(
            "/userdb",
            get(handlers::get_userdb).post(handlers::save_userdb),
        )
        .route("/notes", get(handlers::get_notes).post(handlers::save_notes))
        // Transmission
        .route("/tx", post(handlers::transmit_once))
        .route("/show", post(handlers::run_demo))
        // Live feed
        .route("/sniff", get(websocket::sniff_handler))
        .route("/sniff/start", post(handlers::start_observation))
        .route("/sniff/stop", post(handlers::stop_observation))
        // Tools
        .route("/api/rules/test", post(handlers::test_rules))
        .route(
            "/api/log-level",
            get(handlers::get_log_level).put(handlers::set_log_level),
        );

    if let Some(dir) = &state.config.api.static_dir {
        info!("Serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        // Apply HTTP request logging middleware
        .layer(axum::middleware::from_fn(common::logging::http_request_logger))
        .with_state(state)
}
