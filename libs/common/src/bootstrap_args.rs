//! Common command-line arguments for services

#[cfg(feature = "cli")]
use clap::Parser;
use std::path::PathBuf;

/// Common service startup arguments
///
/// Every field is an override; `None` leaves the configured value in place.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", clap(author, version, about))]
pub struct ServiceArgs {
    /// Configuration file (YAML, TOML or JSON)
    #[cfg_attr(feature = "cli", clap(short = 'c', long, env = "CONFIG_FILE"))]
    pub config: Option<PathBuf>,

    /// Log filter override (trace, debug, info, warn, error or a full directive)
    #[cfg_attr(feature = "cli", clap(short = 'l', long))]
    pub log_level: Option<String>,

    /// Bind address override (e.g., 0.0.0.0:6080)
    #[cfg_attr(feature = "cli", clap(short = 'b', long, env = "BIND_ADDRESS"))]
    pub bind_address: Option<String>,

    /// Database path override
    #[cfg_attr(feature = "cli", clap(long, env = "DB_PATH"))]
    pub db_path: Option<String>,

    /// Disable colored output (useful for log files)
    #[cfg_attr(feature = "cli", clap(long))]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[cfg_attr(feature = "cli", clap(long))]
    pub validate: bool,
}

impl ServiceArgs {
    /// Parse the log override into a level, if it is a bare level name
    pub fn parse_log_level(&self) -> Option<tracing::Level> {
        self.log_level
            .as_deref()
            .and_then(|level| match level.to_lowercase().as_str() {
                "trace" => Some(tracing::Level::TRACE),
                "debug" => Some(tracing::Level::DEBUG),
                "info" => Some(tracing::Level::INFO),
                "warn" | "warning" => Some(tracing::Level::WARN),
                "error" => Some(tracing::Level::ERROR),
                _ => None,
            })
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        matches!(
            self.parse_log_level(),
            Some(tracing::Level::DEBUG | tracing::Level::TRACE)
        )
    }
}
