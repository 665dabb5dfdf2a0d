//! Service bootstrap utilities: startup banner and logging setup

use crate::logging::{self, LogConfig};
use std::path::PathBuf;
use tracing::info;

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "canflexsrv")
    pub name: String,
    pub version: String,
    pub description: String,
    pub default_port: u16,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_port,
        }
    }
}

/// Print the startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
  ██████╗ █████╗ ███╗   ██╗███████╗██╗     ███████╗██╗  ██╗
 ██╔════╝██╔══██╗████╗  ██║██╔════╝██║     ██╔════╝╚██╗██╔╝
 ██║     ███████║██╔██╗ ██║█████╗  ██║     █████╗   ╚███╔╝
 ██║     ██╔══██║██║╚██╗██║██╔══╝  ██║     ██╔══╝   ██╔██╗
 ╚██████╗██║  ██║██║ ╚████║██║     ███████╗███████╗██╔╝ ██╗
  ╚═════╝╚═╝  ╚═╝╚═╝  ╚═══╝╚═╝     ╚══════╝╚══════╝╚═╝  ╚═╝
"#;

    info!("{}", banner);
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
    info!("");
}

/// Initialize logging for a service
///
/// `log_dir` enables the daily file output under `<log_dir>/<service>/`.
pub fn init_logging(
    service: &ServiceInfo,
    level: &str,
    log_dir: Option<PathBuf>,
    ansi: bool,
) -> anyhow::Result<()> {
    logging::init_with_config(LogConfig {
        service_name: service.name.clone(),
        level: level.to_string(),
        log_dir: log_dir.map(|dir| dir.join(&service.name)),
        ansi,
    })
}
