//! Error types shared by storage and configuration code

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for `wlab-common` operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while opening storage or resolving configuration
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite / sqlx failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (creating the data directory, reading config)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file exists but is not valid TOML for [`crate::config::TomlConfig`]
    #[error("Invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration value missing or unusable
    #[error("Configuration error: {0}")]
    Config(String),
}
