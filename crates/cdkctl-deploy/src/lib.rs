//! cdkctl deploy - runs the deployment tool
//!
//! Provides the deployment invoker that:
//! - Skips deployments when the source tree is unchanged
//! - Launches the deployment tool with a deterministic argument vector
//! - Hands failed deployments to the failure diagnostician and error log

pub mod command;
pub mod invocation;
pub mod invoker;
pub mod runner;

// Re-export key types
pub use command::{escape_entry, DeployCommand, MODE_ENV_VAR};
pub use invocation::{DeploymentInvocation, ExecutionMode};
pub use invoker::{DeployOutcome, DeploymentInvoker};
pub use runner::{DeployRunner, RunOutcome};
