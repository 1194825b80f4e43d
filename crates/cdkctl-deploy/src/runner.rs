//! Subprocess execution of the deployment tool.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use cdkctl_core::{CdkctlError, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{DeployCommand, MODE_ENV_VAR};
use crate::invocation::ExecutionMode;

/// Completion status of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code, `-1` when the process was killed by a signal.
    pub exit_code: i32,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,
}

/// Launches the deployment tool.
pub struct DeployRunner;

impl DeployRunner {
    /// Run `command` in `cwd` and wait for it to exit.
    ///
    /// Standard streams are inherited so the operator sees the tool's live
    /// output. The child gets the parent environment plus the mode marker.
    pub async fn run(command: &DeployCommand, cwd: &Path, mode: ExecutionMode) -> Result<RunOutcome> {
        let start = Instant::now();
        info!(command = %command.display(), mode = %mode, "Launching deployment tool");

        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(cwd)
            .env(MODE_ENV_VAR, mode.marker())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| CdkctlError::Spawn {
                tool: command.program.clone(),
                source,
            })?;

        let outcome = RunOutcome {
            exit_code: status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
            success: status.success(),
        };
        debug!(exit_code = outcome.exit_code, duration_ms = outcome.duration_ms, "Deployment tool exited");
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn command(program: PathBuf, args: &[&str]) -> DeployCommand {
        DeployCommand {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_successful_run() {
        let cmd = command(which::which("true").unwrap(), &["deploy"]);
        let outcome = DeployRunner::run(&cmd, Path::new("."), ExecutionMode::Deploy)
            .await
            .expect("run");
        assert!(outcome.success);
        assert_eq!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn test_failing_run() {
        let cmd = command(which::which("false").unwrap(), &["deploy"]);
        let outcome = DeployRunner::run(&cmd, Path::new("."), ExecutionMode::Deploy)
            .await
            .expect("run");
        assert!(!outcome.success);
        assert_ne!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn test_marker_and_args_reach_child() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("synth"),
            "echo \"$CDKCTL_MODE $*\" > seen.txt\n",
        )
        .unwrap();
        let cmd = command(PathBuf::from("sh"), &["synth", "--context", "env=dev"]);

        let outcome = DeployRunner::run(&cmd, dir.path(), ExecutionMode::RenderOnly)
            .await
            .expect("run");
        assert!(outcome.success);
        let seen = std::fs::read_to_string(dir.path().join("seen.txt")).unwrap();
        assert_eq!(seen.trim(), "render-only --context env=dev");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cmd = command(PathBuf::from("/nonexistent/cdkctl-tool"), &["deploy"]);
        let err = DeployRunner::run(&cmd, Path::new("."), ExecutionMode::Deploy)
            .await
            .unwrap_err();
        assert!(matches!(err, CdkctlError::Spawn { .. }));
    }
}
