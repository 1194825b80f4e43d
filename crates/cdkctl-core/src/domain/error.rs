//! Error taxonomy for cdkctl.

use std::path::PathBuf;

use crate::snapshot::SnapshotError;

/// Errors produced while loading or validating `cdkctl.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown environment '{name}' (available: {available})")]
    UnknownEnvironment { name: String, available: String },

    #[error("no credential profile for environment '{0}' (pass --profile or set one in the config)")]
    MissingProfile(String),

    #[error("no {0} entry configured")]
    MissingEntry(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// cdkctl errors.
#[derive(Debug, thiserror::Error)]
pub enum CdkctlError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("stack file does not exist: {}", .0.display())]
    StackFileNotFound(PathBuf),

    #[error("deployment tool '{tool}' not found: {message}")]
    ToolNotFound { tool: String, message: String },

    #[error("failed to launch {}: {source}", .tool.display())]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cdkctl operations.
pub type Result<T> = std::result::Result<T, CdkctlError>;
