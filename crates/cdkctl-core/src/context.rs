//! Per-process deployment context.
//!
//! Built once by the CLI and passed by reference to the invoker and the
//! diagnostician. It owns the parsed config, the environment-derived flags
//! and the deployment tool path, which is resolved on first use and cached.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::change_detector::ChangeDetector;
use crate::config::{ConfigScope, DeployTarget, ProjectConfig};
use crate::domain::{CdkctlError, Result};
use crate::error_log::{is_ci_value, ErrorLogWriter, CI_ENV_VAR};

/// Environment variable that overrides the profile used for diagnosis queries.
pub const PROFILE_OVERRIDE_VAR: &str = "AWS_PROFILE";

/// Everything a deployment needs that outlives a single invocation.
#[derive(Debug)]
pub struct DeployContext {
    root: PathBuf,
    config: ProjectConfig,
    scope: ConfigScope,
    ci: bool,
    profile_override: Option<String>,
    tool_path: OnceLock<PathBuf>,
}

impl DeployContext {
    pub fn new(root: impl Into<PathBuf>, config: ProjectConfig, scope: ConfigScope) -> Self {
        Self {
            root: root.into(),
            config,
            scope,
            ci: false,
            profile_override: None,
            tool_path: OnceLock::new(),
        }
    }

    /// Context whose CI flag and profile override come from the environment.
    pub fn from_env(root: impl Into<PathBuf>, config: ProjectConfig, scope: ConfigScope) -> Self {
        let ci = is_ci_value(std::env::var(CI_ENV_VAR).ok().as_deref());
        let profile_override = std::env::var(PROFILE_OVERRIDE_VAR)
            .ok()
            .filter(|p| !p.trim().is_empty());
        Self::new(root, config, scope)
            .with_ci(ci)
            .with_profile_override(profile_override)
    }

    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    pub fn with_profile_override(mut self, profile: Option<String>) -> Self {
        self.profile_override = profile;
        self
    }

    /// Use `path` as the deployment tool instead of looking it up.
    pub fn with_tool_path(self, path: impl Into<PathBuf>) -> Self {
        let _ = self.tool_path.set(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn scope(&self) -> ConfigScope {
        self.scope
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    /// Deployment tool executable, resolved once per context.
    ///
    /// Looks in `<root>/node_modules/.bin` first, then on `PATH`.
    pub fn tool_path(&self) -> Result<&Path> {
        if let Some(path) = self.tool_path.get() {
            return Ok(path);
        }
        let resolved = resolve_tool(&self.root, &self.config.tool)?;
        debug!(tool = %resolved.display(), "Resolved deployment tool");
        Ok(self.tool_path.get_or_init(|| resolved))
    }

    /// Profile for control-plane queries: the override variable wins over the
    /// profile used for the deployment itself.
    pub fn diagnosis_profile(&self, deploy_profile: &str) -> String {
        self.profile_override
            .clone()
            .unwrap_or_else(|| deploy_profile.to_string())
    }

    /// Change detector for the project tree, backed by `target`'s snapshot.
    /// Every target's snapshot file is excluded from the walk.
    pub fn change_detector(&self, target: DeployTarget) -> Result<ChangeDetector> {
        let detector = ChangeDetector::for_project(
            &self.root,
            &self.config.target_snapshot_file(target),
            &self.config.ignore,
        )?;
        Ok(DeployTarget::ALL.iter().fold(detector, |det, other| {
            det.excluding(&self.config.target_snapshot_file(*other))
        }))
    }

    /// Error log writer for the project directory.
    pub fn error_log(&self) -> ErrorLogWriter {
        ErrorLogWriter::new(&self.root, self.ci)
    }

    /// Resolve `relative` against the project root.
    pub fn project_path(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }
}

fn resolve_tool(root: &Path, tool: &str) -> Result<PathBuf> {
    let local = root.join("node_modules").join(".bin").join(tool);
    if local.is_file() {
        return Ok(local);
    }
    which::which(tool).map_err(|e| CdkctlError::ToolNotFound {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
