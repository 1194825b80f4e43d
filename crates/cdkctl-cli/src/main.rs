//! cdkctl - CDK deployment orchestrator
//!
//! The `cdkctl` command drives CDK deployments across accounts and
//! environments, skipping unchanged trees and diagnosing failed stacks.
//!
//! ## Commands
//!
//! - `deploy`: Deploy the app to an environment
//! - `undeploy`: Destroy an environment's stacks
//! - `cicd`: Deploy the delivery pipeline app
//! - `domain`: Deploy the domain app
//! - `clean`: Remove error logs
//! - `init`: Write a starter `cdkctl.toml`

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use cdkctl_core::{
    ConfigScope, DeployContext, DeployTarget, ErrorLogWriter, ProjectConfig, CONFIG_FILE_NAME,
};
use cdkctl_deploy::{DeployOutcome, DeploymentInvocation, DeploymentInvoker, ExecutionMode};
use cfn_events::CloudFormationEvents;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "cdkctl")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CDK deployment orchestrator", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file (default: ./cdkctl.toml)
    #[arg(short, long, global = true, env = "CDKCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Stack entry file, overriding the configured one
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Target environment (optional when only one is configured)
    #[arg(short, long, global = true)]
    env: Option<String>,

    /// Credential profile, overriding the configured one
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Render templates only, deploy nothing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Deploy even when no change is detected
    #[arg(long, global = true)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy the app to an environment
    Deploy(DeployArgs),

    /// Destroy the stacks of an environment
    Undeploy {
        /// Extra flags passed to the deployment tool
        #[arg(last = true)]
        passthrough: Vec<String>,
    },

    /// Deploy the delivery pipeline app (pipeline environments)
    Cicd(DeployArgs),

    /// Deploy the domain app
    Domain(DeployArgs),

    /// Remove error logs from the project directory
    Clean,

    /// Write a starter config file
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct DeployArgs {
    /// Output directory for rendered templates
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extra flags passed to the deployment tool
    #[arg(last = true)]
    passthrough: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cdkctl_core::init_tracing(cli.global.json, level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let global = &cli.global;
    match cli.command {
        Commands::Deploy(args) => cmd_deploy(global, DeployTarget::App, global.mode(), args).await,
        Commands::Undeploy { passthrough } => {
            let args = DeployArgs {
                output: None,
                passthrough,
            };
            cmd_deploy(global, DeployTarget::App, ExecutionMode::Destroy, args).await
        }
        Commands::Cicd(args) => cmd_deploy(global, DeployTarget::Pipeline, global.mode(), args).await,
        Commands::Domain(args) => cmd_deploy(global, DeployTarget::Domain, global.mode(), args).await,
        Commands::Clean => cmd_clean(global),
        Commands::Init { project } => cmd_init(global, project.as_deref()),
    }
}

impl GlobalArgs {
    fn mode(&self) -> ExecutionMode {
        if self.dry_run {
            ExecutionMode::RenderOnly
        } else {
            ExecutionMode::Deploy
        }
    }

    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Project root: the directory holding the config file.
    fn project_root(&self) -> Result<PathBuf> {
        let path = self.config_path();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if parent.is_absolute() {
            return Ok(parent);
        }
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Ok(cwd.join(parent))
    }
}

/// Deploy, destroy or render one app of the project.
async fn cmd_deploy(
    global: &GlobalArgs,
    target: DeployTarget,
    mode: ExecutionMode,
    args: DeployArgs,
) -> Result<ExitCode> {
    let root = global.project_root()?;
    let config_path = global.config_path();
    let config = ProjectConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let scope = match target {
        DeployTarget::Pipeline => ConfigScope::Pipeline,
        DeployTarget::App | DeployTarget::Domain => ConfigScope::from_env(),
    };
    config.validate(scope)?;

    let env = resolve_environment(&config, scope, global.env.as_deref())?;
    let region = config.environment(scope, &env)?.region.clone();
    let profile = config.resolve_profile(scope, &env, global.profile.as_deref())?;
    let entry = match &global.file {
        Some(file) => file.clone(),
        None => config.target_entry(target)?.to_path_buf(),
    };

    let mut invocation = DeploymentInvocation::new(env.as_str(), profile.as_str(), entry, mode)
        .with_target(target)
        .with_passthrough(args.passthrough)
        .with_force(global.force);
    if let Some(output) = args.output {
        invocation = invocation.with_output_dir(output);
    }

    let ctx = DeployContext::from_env(root, config, scope);
    debug!(root = %ctx.root().display(), scope = ctx.scope().as_str(), ci = ctx.is_ci(), "Loaded project");
    let events = CloudFormationEvents::new(Some(ctx.diagnosis_profile(&profile)), Some(region));

    let outcome = DeploymentInvoker::new(&ctx, &events)
        .invoke(&invocation)
        .await?;
    Ok(report_outcome(&env, &outcome))
}

/// Pick the environment: the explicit one, or the only one configured.
fn resolve_environment(
    config: &ProjectConfig,
    scope: ConfigScope,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(env) = explicit {
        config.environment(scope, env)?;
        return Ok(env.to_string());
    }
    let envs = config.environments(scope);
    match envs.keys().next() {
        Some(only) if envs.len() == 1 => Ok(only.clone()),
        _ => bail!(
            "several environments are configured ({}), choose one with --env",
            envs.keys().cloned().collect::<Vec<_>>().join(", ")
        ),
    }
}

fn report_outcome(env: &str, outcome: &DeployOutcome) -> ExitCode {
    match outcome {
        DeployOutcome::Skipped => {
            println!(
                "{} No changes detected for {}; nothing to deploy (use --force to deploy anyway)",
                "-".dimmed(),
                env.bold()
            );
        }
        DeployOutcome::Completed(run) => {
            println!(
                "{} {} finished in {:.1}s",
                "✓".green(),
                env.bold(),
                run.duration_ms as f64 / 1000.0
            );
        }
        DeployOutcome::Failed {
            run,
            report,
            error_log,
        } => {
            eprintln!(
                "{} deployment to {} failed (exit code {})",
                "error:".red().bold(),
                env,
                run.exit_code
            );
            if report.is_empty() {
                eprintln!(
                    "{} no failure details could be retrieved from CloudFormation",
                    "warning:".yellow().bold()
                );
            } else {
                if let Some(stack) = &report.stack {
                    eprintln!("\nFailed resources in {}:\n", stack.bold());
                }
                for block in report.blocks() {
                    eprintln!("{block}");
                }
            }
            if let Some(path) = error_log {
                eprintln!("Error details written to {}", path.display());
            }
        }
    }
    ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1))
}

/// Remove all error logs from the project directory.
fn cmd_clean(global: &GlobalArgs) -> Result<ExitCode> {
    let root = global.project_root()?;
    let removed = clean_error_logs(&root)?;
    println!("Removed {removed} error log(s) from {}", root.display());
    Ok(ExitCode::SUCCESS)
}

fn clean_error_logs(root: &Path) -> Result<usize> {
    ErrorLogWriter::new(root, false)
        .cleanup()
        .with_context(|| format!("Failed to clean error logs in {}", root.display()))
}

/// Write a starter config unless one exists.
fn cmd_init(global: &GlobalArgs, project: Option<&str>) -> Result<ExitCode> {
    let path = global.config_path();
    let root = global.project_root()?;
    let written = write_starter_config(&path, &root, project)?;
    println!("Wrote {}", written.display());
    Ok(ExitCode::SUCCESS)
}

fn write_starter_config(path: &Path, root: &Path, project: Option<&str>) -> Result<PathBuf> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let project = match project {
        Some(name) => name.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty() && n != ".")
            .unwrap_or_else(|| "app".to_string()),
    };
    std::fs::write(path, ProjectConfig::template(&project))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const TWO_ENVS: &str = r#"
project = "acme"

[environments.dev]
account = "111111111111"
region = "eu-west-1"

[environments.prod]
account = "222222222222"
region = "us-east-1"
"#;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy_with_globals_and_passthrough() {
        let cli = Cli::try_parse_from([
            "cdkctl", "deploy", "--env", "prod", "--profile", "acme-prod", "--force", "--output",
            "out", "--", "--require-approval", "never",
        ])
        .unwrap();
        assert_eq!(cli.global.env.as_deref(), Some("prod"));
        assert_eq!(cli.global.profile.as_deref(), Some("acme-prod"));
        assert!(cli.global.force);
        assert_eq!(cli.global.mode(), ExecutionMode::Deploy);
        match cli.command {
            Commands::Deploy(args) => {
                assert_eq!(args.output, Some(PathBuf::from("out")));
                assert_eq!(args.passthrough, vec!["--require-approval", "never"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_selects_render_only() {
        let cli = Cli::try_parse_from(["cdkctl", "--dry-run", "cicd"]).unwrap();
        assert_eq!(cli.global.mode(), ExecutionMode::RenderOnly);
        assert!(matches!(cli.command, Commands::Cicd(_)));
    }

    #[test]
    fn test_resolve_environment() {
        let config = ProjectConfig::parse(TWO_ENVS).unwrap();
        assert_eq!(
            resolve_environment(&config, ConfigScope::Project, Some("prod")).unwrap(),
            "prod"
        );
        assert!(resolve_environment(&config, ConfigScope::Project, Some("qa")).is_err());
        let err = resolve_environment(&config, ConfigScope::Project, None).unwrap_err();
        assert!(err.to_string().contains("--env"));

        let single = ProjectConfig::parse(
            "project = \"acme\"\n[environments.dev]\naccount = \"111111111111\"\nregion = \"eu-west-1\"\n",
        )
        .unwrap();
        assert_eq!(
            resolve_environment(&single, ConfigScope::Project, None).unwrap(),
            "dev"
        );
    }

    #[test]
    fn test_init_writes_loadable_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        write_starter_config(&path, dir.path(), Some("acme")).unwrap();
        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.project, "acme");
        config.validate(ConfigScope::Project).unwrap();

        assert!(write_starter_config(&path, dir.path(), None).is_err());
    }

    #[test]
    fn test_clean_removes_error_logs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deploy-errors-260101000000.log"), "x").unwrap();
        std::fs::write(dir.path().join("cdkctl.toml"), "keep").unwrap();
        assert_eq!(clean_error_logs(dir.path()).unwrap(), 1);
        assert!(dir.path().join("cdkctl.toml").exists());
    }

    #[tokio::test]
    async fn test_missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let global = GlobalArgs {
            config: Some(dir.path().join(CONFIG_FILE_NAME)),
            ..GlobalArgs::default()
        };
        let err = cmd_deploy(&global, DeployTarget::App, ExecutionMode::Deploy, DeployArgs::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to load"));
    }
}
