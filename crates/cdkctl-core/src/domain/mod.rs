//! Domain-level types shared across cdkctl crates.

pub mod error;

pub use error::{CdkctlError, ConfigError, Result};
