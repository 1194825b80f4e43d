//! Deployment invocation: what one CLI call asks the tool to do.

use std::fmt;
use std::path::PathBuf;

use cdkctl_core::DeployTarget;

/// How the deployment tool is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Apply the app to the environment.
    Deploy,

    /// Tear the environment's stacks down.
    Destroy,

    /// Render templates only, apply nothing.
    RenderOnly,
}

impl ExecutionMode {
    /// Tool verb for this mode.
    pub fn verb(&self) -> &'static str {
        match self {
            ExecutionMode::Deploy => "deploy",
            ExecutionMode::Destroy => "destroy",
            ExecutionMode::RenderOnly => "synth",
        }
    }

    /// Value of the mode marker passed to the child process.
    pub fn marker(&self) -> &'static str {
        match self {
            ExecutionMode::Deploy => "deploy",
            ExecutionMode::Destroy => "destroy",
            ExecutionMode::RenderOnly => "render-only",
        }
    }

    /// Only real deployments consult and update the snapshot.
    pub fn tracks_changes(&self) -> bool {
        matches!(self, ExecutionMode::Deploy)
    }

    /// Whether a failure is worth querying the control plane for.
    pub fn diagnoses_failures(&self) -> bool {
        !matches!(self, ExecutionMode::RenderOnly)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// One requested deployment. Built per CLI call and dropped when the tool
/// exits.
#[derive(Debug, Clone)]
pub struct DeploymentInvocation {
    /// Target environment name (e.g. `dev`).
    pub environment: String,

    /// Credential profile passed to the tool.
    pub profile: String,

    /// Stack entry file, relative to the project root or absolute.
    pub entry: PathBuf,

    pub mode: ExecutionMode,

    /// App being deployed; selects the snapshot file and stack name.
    pub target: DeployTarget,

    /// Output directory override (`--output`).
    pub output_dir: Option<PathBuf>,

    /// Raw flags appended after everything else.
    pub passthrough: Vec<String>,

    /// Deploy even when the tree is unchanged.
    pub force: bool,
}

impl DeploymentInvocation {
    pub fn new(
        environment: impl Into<String>,
        profile: impl Into<String>,
        entry: impl Into<PathBuf>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            environment: environment.into(),
            profile: profile.into(),
            entry: entry.into(),
            mode,
            target: DeployTarget::App,
            output_dir: None,
            passthrough: Vec::new(),
            force: false,
        }
    }

    pub fn with_target(mut self, target: DeployTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_passthrough(mut self, flags: Vec<String>) -> Self {
        self.passthrough = flags;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}
