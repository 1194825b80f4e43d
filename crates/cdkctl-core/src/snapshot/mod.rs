//! Source-tree snapshots.
//!
//! A snapshot maps every tracked file (by `/`-separated relative path) to a
//! [`Fingerprint`] of its size and modification time. Entries live in a
//! `BTreeMap`, so serialization is always sorted by path and two snapshots
//! of the same tree are byte-identical.
//!
//! On-disk format, one line per file, no trailing newline:
//!
//! ```text
//! bin/app.ts||3f2a...
//! lib/storage-stack.ts||9c0d...
//! ```

pub mod fs;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::Metadata;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Separator between path and fingerprint on a snapshot line.
pub const FIELD_SEPARATOR: &str = "||";

/// Errors from snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot has been persisted yet.
    #[error("snapshot not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("malformed snapshot line {line}: {content}")]
    Malformed { line: usize, content: String },

    #[error("invalid ignore pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// SHA-256 (hex) of a file's size and modification time.
///
/// File content is never read. An edit that keeps both size and mtime
/// unchanged is not detected.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint from raw size and modification time.
    pub fn compute(len: u64, modified: SystemTime) -> Self {
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let mut hasher = Sha256::new();
        hasher.update(len.to_le_bytes());
        hasher.update(b":");
        hasher.update(nanos.to_le_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Fingerprint from file metadata.
    pub fn of_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        Ok(Self::compute(metadata.len(), metadata.modified()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.0[..12.min(self.0.len())])
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid fingerprint: {s}"));
        }
        Ok(Fingerprint(s.to_ascii_lowercase()))
    }
}

/// Path to fingerprint mapping for a whole source tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, Fingerprint>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path`. Empty paths (the root itself) are ignored.
    pub fn insert(&mut self, path: impl Into<String>, fingerprint: Fingerprint) {
        let path = path.into();
        if !path.is_empty() {
            self.entries.insert(path, fingerprint);
        }
    }

    pub fn get(&self, path: &str) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.entries.iter().map(|(p, f)| (p.as_str(), f))
    }

    /// Serialize as `path||fingerprint` lines joined by `\n`.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|(path, fp)| format!("{path}{FIELD_SEPARATOR}{fp}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse the on-disk format. Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut snapshot = Snapshot::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || SnapshotError::Malformed {
                line: idx + 1,
                content: line.to_string(),
            };
            let (path, fp) = line.rsplit_once(FIELD_SEPARATOR).ok_or_else(malformed)?;
            if path.is_empty() {
                return Err(malformed());
            }
            let fingerprint = fp.parse::<Fingerprint>().map_err(|_| malformed())?;
            snapshot.insert(path, fingerprint);
        }
        Ok(snapshot)
    }
}

/// Durable storage for the last deployed snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Raw persisted bytes. Returns [`SnapshotError::NotFound`] when nothing
    /// has been persisted yet; every other failure is `Io`.
    fn load_bytes(&self) -> Result<Vec<u8>>;

    /// Replace the persisted snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Write `snapshot` to a temporary location and byte-compare it with the
    /// persisted one. Propagates `NotFound` when there is no persisted one.
    fn matches(&self, snapshot: &Snapshot) -> Result<bool>;

    /// Delete the persisted snapshot. Missing is not an error.
    fn remove(&self) -> Result<()>;

    /// Load and parse the persisted snapshot.
    fn load(&self) -> Result<Snapshot> {
        let bytes = self.load_bytes()?;
        let text = String::from_utf8_lossy(&bytes);
        Snapshot::parse(&text)
    }
}
