//! Project configuration (`cdkctl.toml`).
//!
//! ```toml
//! project = "acme"
//! entry = "bin/app.ts"
//!
//! [environments.dev]
//! account = "111111111111"
//! region = "eu-west-1"
//! profile = "acme-dev"
//!
//! [pipeline]
//! entry = "bin/pipeline.ts"
//!
//! [pipeline.environments.tooling]
//! account = "222222222222"
//! region = "eu-west-1"
//! ```
//!
//! Which environment set is visible depends on the [`ConfigScope`]:
//! `CDKCTL_CONFIG_SCOPE=pipeline` (or the `cicd` command) selects the
//! pipeline environments.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;

/// Default config file name at the project root.
pub const CONFIG_FILE_NAME: &str = "cdkctl.toml";

/// Environment variable selecting the environment set.
pub const CONFIG_SCOPE_VAR: &str = "CDKCTL_CONFIG_SCOPE";

/// Which environment definitions are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigScope {
    /// `[environments.*]`
    #[default]
    Project,
    /// `[pipeline.environments.*]`
    Pipeline,
}

impl ConfigScope {
    /// Scope from the value of [`CONFIG_SCOPE_VAR`]. Unknown values fall back
    /// to `Project`.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("pipeline") | Some("cicd") => ConfigScope::Pipeline,
            _ => ConfigScope::Project,
        }
    }

    pub fn from_env() -> Self {
        Self::from_value(std::env::var(CONFIG_SCOPE_VAR).ok().as_deref())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::Project => "project",
            ConfigScope::Pipeline => "pipeline",
        }
    }
}

/// Which app of the project a deployment drives.
///
/// Each target keeps its own snapshot file and top-level stack name, so a
/// deployed app never marks the domain or pipeline app as up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployTarget {
    /// The main app (`entry`).
    #[default]
    App,
    /// The delivery pipeline app (`[pipeline].entry`).
    Pipeline,
    /// The domain app (`[domain].entry`).
    Domain,
}

impl DeployTarget {
    pub const ALL: [DeployTarget; 3] = [DeployTarget::App, DeployTarget::Pipeline, DeployTarget::Domain];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployTarget::App => "app",
            DeployTarget::Pipeline => "pipeline",
            DeployTarget::Domain => "domain",
        }
    }
}

/// One deployment environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// 12-digit AWS account id.
    pub account: String,
    pub region: String,
    /// Default credential profile; `--profile` overrides it.
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub entry: PathBuf,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub entry: PathBuf,
}

/// Parsed `cdkctl.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name; prefixes every top-level stack name.
    pub project: String,

    /// CDK app entry file, relative to the project root.
    #[serde(default = "default_entry")]
    pub entry: PathBuf,

    /// Command CDK uses to run the entry file.
    #[serde(default = "default_app_command")]
    pub app_command: String,

    /// Deployment tool executable name.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Synthesized output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Snapshot file, relative to the project root.
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: PathBuf,

    /// Globs excluded from change detection.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,

    #[serde(default)]
    pub domain: Option<DomainConfig>,
}

fn default_entry() -> PathBuf {
    PathBuf::from("bin/app.ts")
}

fn default_app_command() -> String {
    "npx ts-node --prefer-ts-exts".to_string()
}

fn default_tool() -> String {
    "cdk".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("cdk.out")
}

fn default_snapshot_file() -> PathBuf {
    PathBuf::from(".snapshot")
}

fn default_ignore() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "cdk.out".to_string(),
        ".git".to_string(),
    ]
}

impl ProjectConfig {
    /// Read and parse a config file. Does not validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Missing(path.to_path_buf())
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Environments visible in `scope`.
    pub fn environments(&self, scope: ConfigScope) -> &BTreeMap<String, EnvironmentConfig> {
        static EMPTY: BTreeMap<String, EnvironmentConfig> = BTreeMap::new();
        match scope {
            ConfigScope::Project => &self.environments,
            ConfigScope::Pipeline => self
                .pipeline
                .as_ref()
                .map(|p| &p.environments)
                .unwrap_or(&EMPTY),
        }
    }

    /// Look up an environment by name in `scope`.
    pub fn environment(
        &self,
        scope: ConfigScope,
        name: &str,
    ) -> Result<&EnvironmentConfig, ConfigError> {
        let envs = self.environments(scope);
        envs.get(name).ok_or_else(|| ConfigError::UnknownEnvironment {
            name: name.to_string(),
            available: envs.keys().cloned().collect::<Vec<_>>().join(", "),
        })
    }

    /// Credential profile for `env`: the explicit one wins over the config.
    pub fn resolve_profile(
        &self,
        scope: ConfigScope,
        env: &str,
        explicit: Option<&str>,
    ) -> Result<String, ConfigError> {
        if let Some(profile) = explicit.filter(|p| !p.trim().is_empty()) {
            return Ok(profile.to_string());
        }
        self.environment(scope, env)?
            .profile
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingProfile(env.to_string()))
    }

    /// Top-level stack name of `env`: `<project>-<env>`.
    pub fn stack_name(&self, env: &str) -> String {
        format!("{}-{}", self.project, env)
    }

    /// Top-level stack name of `target` in `env`. The app keeps
    /// `<project>-<env>`; other targets insert their name.
    pub fn target_stack_name(&self, target: DeployTarget, env: &str) -> String {
        match target {
            DeployTarget::App => self.stack_name(env),
            other => format!("{}-{}-{}", self.project, other.as_str(), env),
        }
    }

    /// Snapshot file of `target`: `snapshot_file` for the app,
    /// `<snapshot_file>-<target>` otherwise.
    pub fn target_snapshot_file(&self, target: DeployTarget) -> PathBuf {
        match target {
            DeployTarget::App => self.snapshot_file.clone(),
            other => {
                let mut name = self.snapshot_file.clone().into_os_string();
                name.push("-");
                name.push(other.as_str());
                PathBuf::from(name)
            }
        }
    }

    /// Entry file of `target`.
    pub fn target_entry(&self, target: DeployTarget) -> Result<&Path, ConfigError> {
        match target {
            DeployTarget::App => Ok(self.entry.as_path()),
            DeployTarget::Pipeline => self.pipeline_entry(),
            DeployTarget::Domain => self.domain_entry(),
        }
    }

    /// Entry file of the pipeline app.
    pub fn pipeline_entry(&self) -> Result<&Path, ConfigError> {
        self.pipeline
            .as_ref()
            .map(|p| p.entry.as_path())
            .ok_or(ConfigError::MissingEntry("[pipeline]"))
    }

    /// Entry file of the domain app.
    pub fn domain_entry(&self) -> Result<&Path, ConfigError> {
        self.domain
            .as_ref()
            .map(|d| d.entry.as_path())
            .ok_or(ConfigError::MissingEntry("[domain]"))
    }

    /// Check everything a deployment in `scope` relies on.
    pub fn validate(&self, scope: ConfigScope) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::Invalid("project must not be empty".to_string()));
        }
        if self.project.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "project '{}' must not contain whitespace",
                self.project
            )));
        }
        if self.tool.trim().is_empty() {
            return Err(ConfigError::Invalid("tool must not be empty".to_string()));
        }

        let envs = self.environments(scope);
        if envs.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no environments defined for the {} scope",
                scope.as_str()
            )));
        }
        for (name, env) in envs {
            if env.account.len() != 12 || !env.account.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Invalid(format!(
                    "environment '{name}': account '{}' is not a 12-digit AWS account id",
                    env.account
                )));
            }
            if env.region.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "environment '{name}': region must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Starter config written by `cdkctl init`.
    pub fn template(project: &str) -> String {
        format!(
            r#"project = "{project}"
entry = "bin/app.ts"
# app_command = "npx ts-node --prefer-ts-exts"
# output_dir = "cdk.out"
# ignore = ["node_modules", "cdk.out", ".git"]

[environments.dev]
account = "000000000000"
region = "eu-west-1"
profile = "{project}-dev"
"#
        )
    }
}
