//! CANflex Service entry point

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use canflexsrv::{
    api::create_routes,
    app::{create_app_state, validate_stored_rules},
    config::{CanflexConfig, DEFAULT_PORT, SERVICE_NAME},
};
use common::{clap::Parser, service_bootstrap::ServiceInfo, ServiceArgs};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Time allowed for workers to finish after the server stops
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServiceArgs::parse();

    let config = CanflexConfig::load(&args).context("Failed to load configuration")?;

    let service_info = ServiceInfo::new(
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        "CAN Trigger & Replay Service",
        DEFAULT_PORT,
    );
    common::service_bootstrap::init_logging(
        &service_info,
        &config.logging.level,
        config.logging.dir.clone(),
        !args.no_color,
    )?;
    if !args.no_color {
        common::service_bootstrap::print_startup_banner(&service_info);
    }

    // Validation mode: validate and exit
    if args.validate {
        let rules = validate_stored_rules(&config)
            .await
            .context("Stored rule set is invalid")?;
        info!("Configuration valid, {} stored rules compile", rules);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    common::shutdown::cancel_on_shutdown(cancel.clone());

    let service = create_app_state(config.clone(), cancel.clone()).await?;
    let app = create_routes(service.state.clone());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("{} listening on http://{}", SERVICE_NAME, addr);

    let server_cancel = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await;

    // Server may also stop on its own error; make sure workers follow
    cancel.cancel();
    if let Err(e) = served {
        error!("Server error: {}", e);
    }

    let workers = futures::future::join_all(service.tasks);
    if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, workers)
        .await
        .is_err()
    {
        warn!("Workers did not stop within {:?}", WORKER_SHUTDOWN_TIMEOUT);
    }
    service.state.store.close().await;

    info!("{} stopped", SERVICE_NAME);
    Ok(())
}
