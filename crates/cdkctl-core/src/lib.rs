//! cdkctl Core Library
//!
//! Change detection, deployment-failure diagnosis and error-log handling for
//! the `cdkctl` deployment orchestrator.

pub mod change_detector;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod domain;
pub mod error_log;
pub mod snapshot;
pub mod telemetry;

pub use change_detector::{ChangeCheck, ChangeDetector, IgnoreSet};
pub use config::{
    ConfigScope, DeployTarget, DomainConfig, EnvironmentConfig, PipelineConfig, ProjectConfig,
    CONFIG_FILE_NAME, CONFIG_SCOPE_VAR,
};
pub use context::{DeployContext, PROFILE_OVERRIDE_VAR};
pub use diagnostics::{format_event, FailureDiagnostician, FailureReport, DEFAULT_MAX_DEPTH};
pub use domain::{CdkctlError, ConfigError, Result};
pub use error_log::{is_ci_value, ErrorLogWriter, CI_ENV_VAR, ERROR_LOG_GLOB};
pub use snapshot::fs::FsSnapshotStore;
pub use snapshot::{Fingerprint, Snapshot, SnapshotError, SnapshotStore};
pub use telemetry::init_tracing;

pub use cfn_events::{StackEvent, StackEventSource};

/// cdkctl version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
