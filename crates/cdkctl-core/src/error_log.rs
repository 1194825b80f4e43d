//! Persists failure reports to `deploy-errors-<YYMMDDHHMMSS>.log` files.
//!
//! Inside CI the writer does nothing; the CI system captures the console
//! output already.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glob::Pattern;
use tracing::{debug, info};

/// Environment variable that marks a CI execution context.
pub const CI_ENV_VAR: &str = "CI";

pub const ERROR_LOG_PREFIX: &str = "deploy-errors-";
pub const ERROR_LOG_SUFFIX: &str = ".log";

const MAX_SAME_SECOND_LOGS: usize = 100;

/// Glob matching every error log file name.
pub const ERROR_LOG_GLOB: &str = "deploy-errors-*.log";

/// Interpret the value of [`CI_ENV_VAR`]. Unset, empty, `false` and `0` mean
/// "not CI".
pub fn is_ci_value(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => !(v.eq_ignore_ascii_case("false") || v == "0"),
    }
}

/// Error log writer rooted at a working directory.
#[derive(Debug, Clone)]
pub struct ErrorLogWriter {
    dir: PathBuf,
    ci: bool,
}

impl ErrorLogWriter {
    pub fn new(dir: impl Into<PathBuf>, ci: bool) -> Self {
        Self {
            dir: dir.into(),
            ci,
        }
    }

    /// Writer whose CI flag comes from the process environment.
    pub fn from_env(dir: impl Into<PathBuf>) -> Self {
        let ci = is_ci_value(std::env::var(CI_ENV_VAR).ok().as_deref());
        Self::new(dir, ci)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a log created at `now` (12-digit timestamp suffix).
    pub fn file_name(now: DateTime<Utc>) -> String {
        format!(
            "{ERROR_LOG_PREFIX}{}{ERROR_LOG_SUFFIX}",
            now.format("%y%m%d%H%M%S")
        )
    }

    /// Write `messages` in order to a new log file. Returns the file path, or
    /// `None` when running in CI.
    pub fn flush<S: AsRef<str>>(&self, messages: &[S]) -> std::io::Result<Option<PathBuf>> {
        self.flush_at(messages, Utc::now())
    }

    /// [`flush`](Self::flush) with an explicit timestamp.
    pub fn flush_at<S: AsRef<str>>(
        &self,
        messages: &[S],
        now: DateTime<Utc>,
    ) -> std::io::Result<Option<PathBuf>> {
        if self.ci {
            debug!(messages = messages.len(), "CI detected, skipping error log");
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;
        let (path, mut file) = self.create_fresh(now)?;
        for message in messages {
            file.write_all(message.as_ref().as_bytes())?;
            if !message.as_ref().ends_with('\n') {
                file.write_all(b"\n")?;
            }
        }
        file.flush()?;

        info!(path = %path.display(), messages = messages.len(), "Wrote error log");
        Ok(Some(path))
    }

    /// Create a log file that did not exist before. A second flush within
    /// the same second gets a `-<n>` suffix instead of reusing the file.
    fn create_fresh(&self, now: DateTime<Utc>) -> std::io::Result<(PathBuf, File)> {
        let stem = now.format("%y%m%d%H%M%S").to_string();
        for attempt in 0..MAX_SAME_SECOND_LOGS {
            let name = if attempt == 0 {
                Self::file_name(now)
            } else {
                format!("{ERROR_LOG_PREFIX}{stem}-{attempt}{ERROR_LOG_SUFFIX}")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("more than {MAX_SAME_SECOND_LOGS} error logs for {stem}"),
        ))
    }

    /// Delete every error log in the directory. Returns how many were removed.
    pub fn cleanup(&self) -> std::io::Result<usize> {
        let pattern = Pattern::new(ERROR_LOG_GLOB)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if pattern.matches(&name.to_string_lossy()) {
                fs::remove_file(entry.path())?;
                debug!(path = %entry.path().display(), "Removed error log");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
