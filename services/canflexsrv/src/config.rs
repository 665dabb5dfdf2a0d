//! Service configuration
//!
//! Layering (later wins): built-in defaults, configuration file (YAML, TOML
//! or JSON by extension), `CANFLEX_` environment variables with `__` as the
//! section separator (e.g. `CANFLEX_API__PORT=7000`), then CLI overrides.

use crate::error::{CanflexError, Result};
use canflex_rules::{GapMode, MAX_TRACKED_RULES};
use common::ServiceArgs;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "canflexsrv";
pub const DEFAULT_PORT: u16 = 6080;
pub const DEFAULT_CONFIG_PATH: &str = "config/canflexsrv.yaml";
pub const ENV_PREFIX: &str = "CANFLEX_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanflexConfig {
    pub api: ApiConfig,
    pub bus: BusConfig,
    pub engine: EngineConfig,
    pub playback: PlaybackConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for paths not matched by the API (control UI)
    pub static_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// In-process bus, no hardware required
    #[default]
    Virtual,
    /// Linux SocketCAN interface
    Socketcan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub kind: BusKind,
    /// Interface name for SocketCAN (e.g. "can0")
    pub interface: String,
    /// Sleep between polls when the bus has nothing pending
    pub poll_interval_ms: u64,
    /// Bounded receive queue between reception and evaluation
    pub rx_queue_capacity: usize,
    /// Virtual bus: feed transmitted frames back as received frames
    pub loopback: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::Virtual,
            interface: "can0".to_string(),
            poll_interval_ms: 1,
            rx_queue_capacity: 32,
            loopback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_tracked_rules: usize,
    pub observe_on_start: bool,
    /// Per-subscriber backlog of the live frame feed
    pub observer_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tracked_rules: MAX_TRACKED_RULES,
            observe_on_start: true,
            observer_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub queue_capacity: usize,
    pub gap_mode: GapMode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            gap_mode: GapMode::AfterEveryRepeat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/canflex.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily log files are written here when set
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

impl CanflexConfig {
    /// Load defaults, file and environment, then apply CLI overrides
    pub fn load(args: &ServiceArgs) -> Result<Self> {
        let mut config: Self = Self::figment(args.config.as_deref())?.extract()?;
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    /// Provider chain without CLI overrides
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = match path {
            Some(p) if !p.exists() => {
                return Err(CanflexError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )))
            },
            Some(p) => Some(p.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        };

        if let Some(file) = file {
            let extension = file.extension().and_then(|s| s.to_str()).unwrap_or("yaml");
            figment = match extension {
                "json" => figment.merge(Json::file(&file)),
                "toml" => figment.merge(Toml::file(&file)),
                "yaml" | "yml" => figment.merge(Yaml::file(&file)),
                other => {
                    return Err(CanflexError::Config(format!(
                        "Unsupported config format: {}",
                        other
                    )))
                },
            };
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn apply_overrides(&mut self, args: &ServiceArgs) {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(addr) = &args.bind_address {
            match addr.parse::<SocketAddr>() {
                Ok(socket) => {
                    self.api.host = socket.ip().to_string();
                    self.api.port = socket.port();
                },
                Err(_) => self.api.host = addr.clone(),
            }
        }
        if let Some(db_path) = &args.db_path {
            self.storage.db_path = db_path.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.port == 0 {
            return Err(invalid("api.port", "port cannot be 0"));
        }
        if self.bus.rx_queue_capacity == 0 {
            return Err(invalid("bus.rx_queue_capacity", "must be at least 1"));
        }
        if self.playback.queue_capacity == 0 {
            return Err(invalid("playback.queue_capacity", "must be at least 1"));
        }
        if self.engine.observer_capacity == 0 {
            return Err(invalid("engine.observer_capacity", "must be at least 1"));
        }
        if !(1..=MAX_TRACKED_RULES).contains(&self.engine.max_tracked_rules) {
            return Err(invalid(
                "engine.max_tracked_rules",
                &format!("must be within 1..={}", MAX_TRACKED_RULES),
            ));
        }
        if self.bus.kind == BusKind::Socketcan && self.bus.interface.trim().is_empty() {
            return Err(invalid("bus.interface", "required for socketcan"));
        }
        if self.storage.db_path.trim().is_empty() {
            return Err(invalid("storage.db_path", "cannot be empty"));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn invalid(field: &str, reason: &str) -> CanflexError {
    CanflexError::Config(format!("{}: {}", field, reason))
}
