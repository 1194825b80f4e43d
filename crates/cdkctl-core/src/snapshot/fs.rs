use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{Result, Snapshot, SnapshotError, SnapshotStore};

/// Snapshot stored as a single UTF-8 file (default `<project>/.snapshot`).
pub struct FsSnapshotStore {
    path: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Write `snapshot` to a temp file next to the snapshot file.
    fn stage(&self, snapshot: &Snapshot) -> Result<NamedTempFile> {
        let dir = self.dir();
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(snapshot.serialize().as_bytes())?;
        tmp.flush()?;
        Ok(tmp)
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn load_bytes(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SnapshotError::NotFound(self.path.clone())
            } else {
                SnapshotError::Io(e)
            }
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        // Atomic replace: stage in the same directory, then rename over.
        let tmp = self.stage(snapshot)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "Persisted snapshot");
        Ok(())
    }

    fn matches(&self, snapshot: &Snapshot) -> Result<bool> {
        let persisted = self.load_bytes()?;
        let staged = self.stage(snapshot)?;
        let fresh = fs::read(staged.path())?;
        Ok(fresh == persisted)
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::Io(e)),
        }
    }
}
