//! Deployment orchestration.
//!
//! Gates a deployment on change detection, runs the tool and, when it
//! fails, collects a failure report and writes the error log. Failed
//! deployments are never retried.

use std::path::{Path, PathBuf};

use cdkctl_core::{
    CdkctlError, ChangeDetector, DeployContext, FailureDiagnostician, FailureReport, Result,
    Snapshot, StackEventSource,
};
use tracing::{info, warn};

use crate::command::DeployCommand;
use crate::invocation::{DeploymentInvocation, ExecutionMode};
use crate::runner::{DeployRunner, RunOutcome};

/// Result of one invocation.
#[derive(Debug, Clone)]
pub enum DeployOutcome {
    /// The tree is unchanged since the last successful deployment.
    Skipped,

    /// The tool exited successfully.
    Completed(RunOutcome),

    /// The tool exited with a failure status.
    Failed {
        run: RunOutcome,
        report: FailureReport,
        /// Error log written for the report, `None` in CI or when empty.
        error_log: Option<PathBuf>,
    },
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DeployOutcome::Failed { .. })
    }

    /// Process exit code the CLI should report.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployOutcome::Skipped => 0,
            DeployOutcome::Completed(run) => run.exit_code,
            DeployOutcome::Failed { run, .. } if run.exit_code > 0 => run.exit_code,
            DeployOutcome::Failed { .. } => 1,
        }
    }
}

/// Snapshot bookkeeping for a tracked deployment.
struct Tracking {
    detector: ChangeDetector,
    snapshot: Option<Snapshot>,
    baseline_created: bool,
}

/// Runs deployments for one project context.
pub struct DeploymentInvoker<'a> {
    ctx: &'a DeployContext,
    events: &'a dyn StackEventSource,
}

impl<'a> DeploymentInvoker<'a> {
    pub fn new(ctx: &'a DeployContext, events: &'a dyn StackEventSource) -> Self {
        Self { ctx, events }
    }

    /// Run `invocation` to completion.
    ///
    /// Returns `Err` only for problems that prevent the tool from starting
    /// (missing entry file, tool lookup, snapshot I/O). A failing tool run
    /// is a [`DeployOutcome::Failed`]. A baseline created by this run is
    /// removed again on every path that does not end in a completed deploy.
    pub async fn invoke(&self, invocation: &DeploymentInvocation) -> Result<DeployOutcome> {
        let entry = self.ctx.project_path(&invocation.entry);
        if !entry.is_file() {
            return Err(CdkctlError::StackFileNotFound(entry));
        }

        let tool = self.ctx.tool_path()?.to_path_buf();

        let tracking = match self.track(invocation)? {
            Some(tracking) => Some(tracking),
            None if invocation.mode.tracks_changes() => {
                info!(environment = %invocation.environment, "No changes detected, skipping deployment");
                return Ok(DeployOutcome::Skipped);
            }
            None => None,
        };

        let run = match self.launch(invocation, &tool).await {
            Ok(run) => run,
            Err(e) => {
                discard_baseline(tracking.as_ref());
                return Err(e);
            }
        };

        if run.success {
            if let Err(e) = self.on_success(invocation, tracking.as_ref()) {
                discard_baseline(tracking.as_ref());
                return Err(e);
            }
            return Ok(DeployOutcome::Completed(run));
        }

        warn!(
            environment = %invocation.environment,
            exit_code = run.exit_code,
            mode = %invocation.mode,
            "Deployment tool failed"
        );
        let report = self.diagnose(invocation).await;
        let error_log = self.write_error_log(&report);
        discard_baseline(tracking.as_ref());

        Ok(DeployOutcome::Failed {
            run,
            report,
            error_log,
        })
    }

    async fn launch(&self, invocation: &DeploymentInvocation, tool: &Path) -> Result<RunOutcome> {
        if invocation.mode == ExecutionMode::RenderOnly {
            self.clear_output_dir(invocation)?;
        }
        let command = DeployCommand::build(tool, &self.ctx.config().app_command, invocation);
        DeployRunner::run(&command, self.ctx.root(), invocation.mode).await
    }

    /// Change detection for tracked modes. `None` means "nothing to track"
    /// for untracked modes and "unchanged" for tracked ones.
    fn track(&self, invocation: &DeploymentInvocation) -> Result<Option<Tracking>> {
        if !invocation.mode.tracks_changes() {
            return Ok(None);
        }
        let detector = self.ctx.change_detector(invocation.target)?;
        if invocation.force {
            info!("Change detection bypassed");
            return Ok(Some(Tracking {
                detector,
                snapshot: None,
                baseline_created: false,
            }));
        }

        let check = detector.check()?;
        if !check.changed {
            return Ok(None);
        }
        Ok(Some(Tracking {
            detector,
            snapshot: Some(check.snapshot),
            baseline_created: check.baseline_created,
        }))
    }

    fn on_success(&self, invocation: &DeploymentInvocation, tracking: Option<&Tracking>) -> Result<()> {
        match invocation.mode {
            ExecutionMode::Deploy => {
                if let Some(tracking) = tracking {
                    match &tracking.snapshot {
                        Some(snapshot) => tracking.detector.persist(snapshot)?,
                        None => {
                            tracking.detector.persist_current()?;
                        }
                    }
                }
                info!(environment = %invocation.environment, "Deployment complete");
            }
            ExecutionMode::Destroy => {
                // Nothing is deployed any more, so the next deploy must run.
                self.ctx.change_detector(invocation.target)?.invalidate()?;
                info!(environment = %invocation.environment, "Environment destroyed");
            }
            ExecutionMode::RenderOnly => {
                info!(environment = %invocation.environment, "Templates rendered");
            }
        }
        Ok(())
    }

    async fn diagnose(&self, invocation: &DeploymentInvocation) -> FailureReport {
        if !invocation.mode.diagnoses_failures() {
            return FailureReport::empty();
        }
        let stack = self
            .ctx
            .config()
            .target_stack_name(invocation.target, &invocation.environment);
        let report = FailureDiagnostician::new(self.events).diagnose(&stack).await;
        if report.is_empty() {
            info!(stack = %stack, "No failure events found");
        }
        report
    }

    fn write_error_log(&self, report: &FailureReport) -> Option<PathBuf> {
        if report.is_empty() {
            return None;
        }
        match self.ctx.error_log().flush(&report.blocks()) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Could not write error log");
                None
            }
        }
    }

    fn clear_output_dir(&self, invocation: &DeploymentInvocation) -> Result<()> {
        let dir = invocation
            .output_dir
            .as_deref()
            .unwrap_or(self.ctx.config().output_dir.as_path());
        let dir = self.ctx.project_path(dir);
        remove_dir_if_exists(&dir)?;
        info!(path = %dir.display(), "Cleared staged output");
        Ok(())
    }
}

/// Drop a baseline written by this run's first check, so a run that never
/// deployed cannot leave the tree looking up to date.
fn discard_baseline(tracking: Option<&Tracking>) {
    let Some(tracking) = tracking.filter(|t| t.baseline_created) else {
        return;
    };
    if let Err(e) = tracking.detector.invalidate() {
        warn!(error = %e, "Could not drop snapshot baseline");
    }
}

fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
