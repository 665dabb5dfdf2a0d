//! Application state and initialization logic
//!
//! Startup order: storage, bus, runtime workers, then the stored rule set.
//! A stored rule set that no longer compiles is logged and the service starts
//! with no rules rather than refusing to boot.

use crate::bus::{open_bus, OpenedBus, VirtualBus};
use crate::config::CanflexConfig;
use crate::error::Result;
use crate::fanout::FanoutHub;
use crate::runtime::{Runtime, RuntimeOptions};
use crate::storage::DocumentStore;
use canflex_rules::{compile_rule_set, RuleSetReport};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Application state shared across all handlers
pub struct AppState {
    pub config: Arc<CanflexConfig>,
    pub store: DocumentStore,
    pub runtime: Runtime,
    /// Injection handle when running on the virtual bus
    pub virtual_bus: Option<Arc<VirtualBus>>,
    pub started_at: Instant,
    /// Serializes validate-swap-save of the rule document
    pub config_update: Mutex<()>,
    /// Fired on shutdown; long-lived connections watch it
    pub shutdown: CancellationToken,
}

/// Running service: shared state plus the worker tasks to await on shutdown
pub struct ServiceHandle {
    pub state: Arc<AppState>,
    pub tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Start the runtime on an opened bus and restore the stored rule set
    pub async fn build(
        config: CanflexConfig,
        store: DocumentStore,
        opened: OpenedBus,
        cancel: CancellationToken,
    ) -> ServiceHandle {
        let hub = FanoutHub::new(config.engine.observer_capacity);
        let (runtime, tasks) =
            Runtime::spawn(RuntimeOptions::from(&config), opened.bus, hub, cancel.clone());

        if let Some(report) = restore_rule_set(&store, &runtime).await {
            info!(
                "Restored {} rules ({} monitored)",
                report.total, report.monitored
            );
            if !report.unmonitored.is_empty() {
                warn!(
                    "{} stored rules exceed the tracking capacity and are not monitored",
                    report.unmonitored.len()
                );
            }
        }

        let state = Arc::new(Self {
            config: Arc::new(config),
            store,
            runtime,
            virtual_bus: opened.virtual_bus,
            started_at: Instant::now(),
            config_update: Mutex::new(()),
            shutdown: cancel,
        });

        ServiceHandle { state, tasks }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Create application state from configuration
pub async fn create_app_state(
    config: CanflexConfig,
    cancel: CancellationToken,
) -> Result<ServiceHandle> {
    let store = DocumentStore::connect(&config.storage.db_path).await?;
    info!("Document store: {}", config.storage.db_path);

    let opened = open_bus(&config.bus)?;
    Ok(AppState::build(config, store, opened, cancel).await)
}

async fn restore_rule_set(store: &DocumentStore, runtime: &Runtime) -> Option<RuleSetReport> {
    let doc = match store.load_rule_set().await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            info!("No stored rule set, starting empty");
            return None;
        },
        Err(e) => {
            warn!("Stored rule set unreadable, starting empty: {}", e);
            return None;
        },
    };

    match compile_rule_set(&doc) {
        Ok(rules) => Some(runtime.replace_rules(rules)),
        Err(e) => {
            warn!("Stored rule set rejected, starting empty: {}", e);
            None
        },
    }
}

/// Check the stored rule document without starting anything
pub async fn validate_stored_rules(config: &CanflexConfig) -> Result<usize> {
    if !std::path::Path::new(&config.storage.db_path).exists() {
        return Ok(0);
    }
    let store = DocumentStore::connect(&config.storage.db_path).await?;
    match store.load_rule_set().await? {
        Some(doc) => Ok(compile_rule_set(&doc)?.len()),
        None => Ok(0),
    }
}
