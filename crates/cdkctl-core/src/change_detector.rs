//! Decides whether a redeploy is necessary.
//!
//! The detector walks the project tree, builds a [`Snapshot`] and compares it
//! with the one persisted after the last successful deployment. Checking
//! never consumes the dirty state: a changed tree stays changed until the
//! caller explicitly persists after deploying.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error_log::ERROR_LOG_GLOB;
use crate::snapshot::fs::FsSnapshotStore;
use crate::snapshot::{Fingerprint, Result, Snapshot, SnapshotError, SnapshotStore};

/// Compiled ignore globs plus exact exclusions.
///
/// A pattern matches an entry when it matches either the entry's file name
/// (`node_modules`) or its `/`-separated path relative to the root
/// (`docs/*.md`). Exclusions match only the exact relative path. Ignored
/// directories are not descended into.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
    exact: Vec<String>,
}

impl IgnoreSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut set = Self::default();
        for pattern in patterns {
            set.add_pattern(pattern.as_ref())?;
        }
        Ok(set)
    }

    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        let compiled = Pattern::new(pattern).map_err(|e| SnapshotError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        self.patterns.push(compiled);
        Ok(())
    }

    /// Ignore exactly `relative_path` (`/`-separated, relative to the root).
    pub fn add_literal(&mut self, relative_path: &str) {
        if !relative_path.is_empty() {
            self.exact.push(relative_path.to_string());
        }
    }

    pub fn is_ignored(&self, relative_path: &str, file_name: &str) -> bool {
        self.exact.iter().any(|p| p == relative_path)
            || self
                .patterns
                .iter()
                .any(|p| p.matches(file_name) || p.matches(relative_path))
    }
}

/// Outcome of one detector run.
#[derive(Debug, Clone)]
pub struct ChangeCheck {
    /// Whether the tree differs from the persisted snapshot.
    pub changed: bool,

    /// Whether no snapshot existed and this run recorded the first baseline.
    pub baseline_created: bool,

    /// The freshly computed snapshot, ready to persist after a deploy.
    pub snapshot: Snapshot,
}

/// Change detector for one project root.
pub struct ChangeDetector<S: SnapshotStore = FsSnapshotStore> {
    root: PathBuf,
    ignore: IgnoreSet,
    store: S,
}

impl ChangeDetector<FsSnapshotStore> {
    /// Detector with the snapshot stored at `<root>/<snapshot_file>`.
    ///
    /// The snapshot file and error logs are always excluded from the walk,
    /// otherwise persisting a snapshot would itself dirty the tree.
    pub fn for_project<S: AsRef<str>>(
        root: impl Into<PathBuf>,
        snapshot_file: &Path,
        ignore: &[S],
    ) -> Result<Self> {
        let root = root.into();
        let snapshot_path = root.join(snapshot_file);
        let mut ignore = IgnoreSet::new(ignore)?;
        ignore.add_pattern(ERROR_LOG_GLOB)?;
        Ok(Self::new(root, ignore, FsSnapshotStore::new(snapshot_path)).excluding(snapshot_file))
    }
}

impl<S: SnapshotStore> ChangeDetector<S> {
    pub fn new(root: impl Into<PathBuf>, ignore: IgnoreSet, store: S) -> Self {
        Self {
            root: root.into(),
            ignore,
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Exclude one file from the walk. `path` is taken relative to the root
    /// unless absolute; absolute paths outside the root are ignored.
    pub fn excluding(mut self, path: &Path) -> Self {
        let relative = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => return self,
            }
        } else {
            path
        };
        self.ignore.add_literal(&relative_key(relative));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fingerprint every regular, non-ignored file under the root.
    pub fn scan(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_ignored(entry));

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.depth() == 0 || !entry.file_type().is_file() {
                continue;
            }
            let key = self.relative(entry.path());
            if key.is_empty() {
                continue;
            }
            let metadata = entry.metadata().map_err(std::io::Error::from)?;
            snapshot.insert(key, Fingerprint::of_metadata(&metadata)?);
        }

        debug!(root = %self.root.display(), files = snapshot.len(), "Scanned source tree");
        Ok(snapshot)
    }

    /// Scan and compare against the persisted snapshot.
    ///
    /// With no persisted snapshot the fresh one becomes the baseline and the
    /// tree counts as changed. Any I/O failure other than "not found" is
    /// returned as an error.
    pub fn check(&self) -> Result<ChangeCheck> {
        let snapshot = self.scan()?;
        match self.store.matches(&snapshot) {
            Ok(same) => {
                debug!(changed = !same, entries = snapshot.len(), "Compared with persisted snapshot");
                Ok(ChangeCheck {
                    changed: !same,
                    baseline_created: false,
                    snapshot,
                })
            }
            Err(SnapshotError::NotFound(path)) => {
                info!(path = %path.display(), "No snapshot yet, recording baseline");
                self.store.save(&snapshot)?;
                Ok(ChangeCheck {
                    changed: true,
                    baseline_created: true,
                    snapshot,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Whether the tree changed since the last persisted snapshot.
    pub fn has_changed(&self) -> Result<bool> {
        Ok(self.check()?.changed)
    }

    /// Persist `snapshot` as the new deployed state.
    pub fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        self.store.save(snapshot)
    }

    /// Scan and persist in one step.
    pub fn persist_current(&self) -> Result<Snapshot> {
        let snapshot = self.scan()?;
        self.store.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Drop the persisted snapshot so the next check reports a change.
    pub fn invalidate(&self) -> Result<()> {
        self.store.remove()
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.ignore.is_ignored(&self.relative(entry.path()), &name)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(relative_key)
            .unwrap_or_default()
    }
}

/// `/`-joined components, independent of the host separator.
fn relative_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    fn detector(root: &Path, ignore: &[&str]) -> ChangeDetector {
        ChangeDetector::for_project(root, Path::new(".snapshot"), ignore).unwrap()
    }

    fn touch(path: &Path, mtime: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn ignore_set_matches_names_and_paths() {
        let set = IgnoreSet::new(&["node_modules", "docs/*.md"]).unwrap();
        assert!(set.is_ignored("node_modules", "node_modules"));
        assert!(set.is_ignored("packages/a/node_modules", "node_modules"));
        assert!(set.is_ignored("docs/intro.md", "intro.md"));
        assert!(!set.is_ignored("lib/docs.ts", "docs.ts"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        match IgnoreSet::new(&["[unclosed"]) {
            Err(SnapshotError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "[unclosed"),
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn exact_exclusion_matches_only_that_path() {
        let mut set = IgnoreSet::default();
        set.add_literal(".snapshot");
        assert!(set.is_ignored(".snapshot", ".snapshot"));
        assert!(!set.is_ignored("fixtures/.snapshot", ".snapshot"));
    }

    #[test]
    fn nested_file_named_like_snapshot_is_tracked() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("fixtures")).unwrap();
        fs::write(dir.path().join("fixtures/.snapshot"), "fixture").unwrap();
        fs::write(dir.path().join(".snapshot"), "").unwrap();

        let snap = detector(dir.path(), &[] as &[&str]).scan().unwrap();
        let paths: Vec<&str> = snap.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["fixtures/.snapshot"]);
    }

    #[test]
    fn absolute_snapshot_path_inside_root_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("state")).unwrap();
        fs::write(dir.path().join("app.ts"), "a").unwrap();
        let snapshot = dir.path().join("state/tree.snapshot");

        let det = ChangeDetector::for_project(dir.path(), &snapshot, &[] as &[&str]).unwrap();
        assert!(det.check().unwrap().baseline_created);
        assert!(snapshot.exists());
        assert!(!det.has_changed().unwrap());
    }

    #[test]
    fn scan_skips_ignored_directories_and_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/aws-cdk-lib")).unwrap();
        fs::create_dir_all(dir.path().join("cdk.out")).unwrap();
        fs::write(dir.path().join("lib/stack.ts"), "export {}").unwrap();
        fs::write(dir.path().join("node_modules/aws-cdk-lib/index.js"), "x").unwrap();
        fs::write(dir.path().join("cdk.out/manifest.json"), "{}").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        let snap = detector(dir.path(), &["node_modules", "cdk.out"]).scan().unwrap();
        let paths: Vec<&str> = snap.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["lib/stack.ts", "package.json"]);
    }

    #[test]
    fn snapshot_and_error_logs_are_never_tracked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.ts"), "a").unwrap();
        fs::write(dir.path().join(".snapshot"), "").unwrap();
        fs::write(dir.path().join("deploy-errors-260101120000.log"), "boom").unwrap();

        let snap = detector(dir.path(), &[] as &[&str]).scan().unwrap();
        assert_eq!(snap.len(), 1);
        assert!(snap.get("app.ts").is_some());
    }

    #[test]
    fn first_check_records_baseline() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.ts"), "a").unwrap();
        let det = detector(dir.path(), &[] as &[&str]);

        let check = det.check().unwrap();
        assert!(check.changed);
        assert!(check.baseline_created);
        assert!(dir.path().join(".snapshot").exists());

        let check = det.check().unwrap();
        assert!(!check.changed);
        assert!(!check.baseline_created);
    }

    #[test]
    fn checking_does_not_consume_dirty_state() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.ts");
        fs::write(&file, "a").unwrap();
        let det = detector(dir.path(), &[] as &[&str]);
        det.check().unwrap();

        fs::write(&file, "ab").unwrap();
        assert!(det.has_changed().unwrap());
        assert!(det.has_changed().unwrap());

        det.persist_current().unwrap();
        assert!(!det.has_changed().unwrap());
    }

    #[test]
    fn mtime_change_alone_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.ts");
        fs::write(&file, "a").unwrap();
        touch(&file, SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let det = detector(dir.path(), &[] as &[&str]);
        det.check().unwrap();

        touch(&file, SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_060));
        assert!(det.has_changed().unwrap());
    }

    #[test]
    fn invalidate_forces_change() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.ts"), "a").unwrap();
        let det = detector(dir.path(), &[] as &[&str]);
        det.check().unwrap();
        assert!(!det.has_changed().unwrap());

        det.invalidate().unwrap();
        assert!(det.check().unwrap().baseline_created);
    }
}
