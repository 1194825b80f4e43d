//! Argument vector construction for the deployment tool.

use std::path::{Path, PathBuf};

use crate::invocation::DeploymentInvocation;

/// Environment variable telling the app which mode it runs under.
pub const MODE_ENV_VAR: &str = "CDKCTL_MODE";

/// Fully resolved tool command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl DeployCommand {
    /// Build the command for `invocation`.
    ///
    /// Order is fixed: verb, `--app`, `--context env=<env>`, `--profile`,
    /// then `--output` when overridden, then the raw pass-through flags.
    pub fn build(tool: &Path, app_command: &str, invocation: &DeploymentInvocation) -> Self {
        let mut args = vec![
            invocation.mode.verb().to_string(),
            "--app".to_string(),
            format!("{} {}", app_command.trim(), escape_entry(&invocation.entry)),
            "--context".to_string(),
            format!("env={}", invocation.environment),
            "--profile".to_string(),
            invocation.profile.clone(),
        ];
        if let Some(dir) = &invocation.output_dir {
            args.push("--output".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }
        args.extend(invocation.passthrough.iter().cloned());

        Self {
            program: tool.to_path_buf(),
            args,
        }
    }

    /// Printable command line for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Double-quote `entry` for embedding in the `--app` command string.
pub fn escape_entry(entry: &Path) -> String {
    let raw = entry.to_string_lossy();
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::ExecutionMode;

    fn invocation(mode: ExecutionMode) -> DeploymentInvocation {
        DeploymentInvocation::new("dev", "acme-dev", "bin/app.ts", mode)
    }

    #[test]
    fn test_deploy_argument_order() {
        let cmd = DeployCommand::build(
            Path::new("/p/node_modules/.bin/cdk"),
            "npx ts-node --prefer-ts-exts",
            &invocation(ExecutionMode::Deploy),
        );
        assert_eq!(
            cmd.args,
            vec![
                "deploy",
                "--app",
                "npx ts-node --prefer-ts-exts \"bin/app.ts\"",
                "--context",
                "env=dev",
                "--profile",
                "acme-dev",
            ]
        );
    }

    #[test]
    fn test_output_and_passthrough_come_last() {
        let inv = invocation(ExecutionMode::RenderOnly)
            .with_output_dir("out/dev")
            .with_passthrough(vec!["--quiet".to_string()]);
        let cmd = DeployCommand::build(Path::new("cdk"), "node", &inv);
        assert_eq!(cmd.args[0], "synth");
        assert_eq!(&cmd.args[7..], &["--output", "out/dev", "--quiet"]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let inv = invocation(ExecutionMode::Destroy).with_passthrough(vec!["--all".to_string()]);
        let a = DeployCommand::build(Path::new("cdk"), "node", &inv);
        let b = DeployCommand::build(Path::new("cdk"), "node", &inv);
        assert_eq!(a, b);
        assert_eq!(a.display(), "cdk destroy --app node \"bin/app.ts\" --context env=dev --profile acme-dev --all");
    }

    #[test]
    fn test_escape_entry() {
        assert_eq!(escape_entry(Path::new("bin/app.ts")), "\"bin/app.ts\"");
        assert_eq!(
            escape_entry(Path::new("my apps/\"main\".ts")),
            "\"my apps/\\\"main\\\".ts\""
        );
        assert_eq!(escape_entry(Path::new("$HOME/a.ts")), "\"\\$HOME/a.ts\"");
    }
}
