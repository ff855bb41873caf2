//! Service configuration resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument / environment variable (both captured by clap)
//! 2. TOML config file
//! 3. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default listen address of the weak supervision service
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7531";

/// Default directory for exported weak supervision artifacts
pub const DEFAULT_INFERENCE_DIR: &str = "/inference";

/// Settings that may appear in `wlab-ws.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub inference_dir: Option<PathBuf>,
    pub notify_endpoint: Option<String>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub inference_dir: Option<PathBuf>,
    pub notify_endpoint: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Root directory for per-project weak supervision exports
    pub inference_dir: PathBuf,
    /// Realtime broadcast endpoint; notifications are only persisted when absent
    pub notify_endpoint: Option<String>,
}

impl ServiceConfig {
    /// Merge overrides, TOML values and defaults (in that priority order)
    pub fn resolve(overrides: ConfigOverrides, toml_config: TomlConfig) -> Self {
        let bind_addr = overrides
            .bind_addr
            .or(toml_config.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let database_path = overrides
            .database_path
            .or(toml_config.database_path)
            .unwrap_or_else(default_database_path);

        let inference_dir = overrides
            .inference_dir
            .or(toml_config.inference_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INFERENCE_DIR));

        // An empty endpoint string disables broadcasting, same as leaving it unset
        let notify_endpoint = overrides
            .notify_endpoint
            .or(toml_config.notify_endpoint)
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty());

        Self {
            bind_addr,
            database_path,
            inference_dir,
            notify_endpoint,
        }
    }
}

/// Load the TOML config file
///
/// With an explicit path the file must exist. Without one, the platform
/// locations are probed and a missing file yields the empty config.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match find_config_file() {
            Some(path) => path,
            None => {
                debug!("No wlab-ws.toml found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str::<TomlConfig>(&content).map_err(|source| Error::ConfigParse {
        path: path.clone(),
        source,
    })?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Probe the user config dir first, then /etc on Linux
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("wlab").join("wlab-ws.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/wlab/wlab-ws.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wlab"))
        .unwrap_or_else(|| PathBuf::from("./wlab_data"))
        .join("wlab.db")
}
