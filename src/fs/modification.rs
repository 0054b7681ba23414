//! Modification-time tracking for source files
//!
//! A [`ModificationMap`] is an immutable snapshot of the last-modified time of
//! every file in a [`FileSet`]. Comparing two snapshots with
//! [`ModificationMap::diff`] tells the module resolver which files need to be
//! parsed again.

use super::glob::FileSet;
use crate::pipeline::BuildError;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Upper bound on concurrent `stat` calls during a scan
const SCAN_CONCURRENCY: usize = 64;

/// Path to last-modified time, captured by a single scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModificationMap {
    entries: BTreeMap<PathBuf, SystemTime>,
}

/// Partition of the union of two maps' paths
///
/// Every path appears in exactly one of the four lists; each list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModificationDiff {
    /// Paths only present in the new map
    pub added: Vec<PathBuf>,

    /// Paths present in both maps with different timestamps
    pub changed: Vec<PathBuf>,

    /// Paths only present in the old map
    pub removed: Vec<PathBuf>,

    /// Paths present in both maps with the same timestamp
    pub unchanged: Vec<PathBuf>,
}

impl ModificationDiff {
    /// `true` when nothing was added, changed or removed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Number of files that must be parsed again (added + changed)
    pub fn dirty_count(&self) -> usize {
        self.added.len() + self.changed.len()
    }

    /// Added and changed paths
    pub fn dirty(&self) -> impl Iterator<Item = &PathBuf> {
        self.added.iter().chain(self.changed.iter())
    }
}

impl ModificationMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stats every path in `files` and records its modification time.
    ///
    /// A path that disappears between discovery and the stat call is left out
    /// of the map, so a later diff reports it as removed. Any other stat
    /// failure aborts the scan.
    pub async fn scan(files: &FileSet) -> Result<Self, BuildError> {
        let stamps: Vec<Option<(PathBuf, SystemTime)>> = stream::iter(files.iter().cloned())
            .map(|path| async move {
                let stamp = modified_time(&path).await;
                match stamp {
                    Ok(time) => Ok(Some((path, time))),
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        debug!(path = %path.display(), "File vanished before it could be stat'ed");
                        Ok(None)
                    }
                    Err(e) => Err(BuildError::io(path, e)),
                }
            })
            .buffered(SCAN_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(stamps.into_iter().flatten().collect())
    }

    /// Classifies every path of `old` and `new` as added, changed, removed or unchanged
    pub fn diff(old: &ModificationMap, new: &ModificationMap) -> ModificationDiff {
        let mut diff = ModificationDiff::default();

        for (path, time) in &new.entries {
            match old.entries.get(path) {
                Some(previous) if previous == time => diff.unchanged.push(path.clone()),
                Some(_) => diff.changed.push(path.clone()),
                None => diff.added.push(path.clone()),
            }
        }

        diff.removed = old
            .entries
            .keys()
            .filter(|path| !new.entries.contains_key(*path))
            .cloned()
            .collect();

        diff
    }

    pub fn get(&self, path: &Path) -> Option<SystemTime> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }
}

impl FromIterator<(PathBuf, SystemTime)> for ModificationMap {
    fn from_iter<I: IntoIterator<Item = (PathBuf, SystemTime)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

async fn modified_time(path: &Path) -> std::io::Result<SystemTime> {
    tokio::fs::metadata(path).await?.modified()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn map(entries: &[(&str, u64)]) -> ModificationMap {
        entries
            .iter()
            .map(|(path, secs)| (PathBuf::from(path), at(*secs)))
            .collect()
    }

    fn touch(dir: &TempDir, name: &str, secs: i64) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, name).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
        path
    }

    #[test]
    fn test_diff_partitions_union() {
        let old = map(&[("a", 1), ("b", 2), ("c", 3)]);
        let new = map(&[("b", 2), ("c", 4), ("d", 5)]);

        let diff = ModificationMap::diff(&old, &new);
        assert_eq!(diff.added, vec![PathBuf::from("d")]);
        assert_eq!(diff.changed, vec![PathBuf::from("c")]);
        assert_eq!(diff.removed, vec![PathBuf::from("a")]);
        assert_eq!(diff.unchanged, vec![PathBuf::from("b")]);
        assert_eq!(diff.dirty_count(), 2);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_against_empty_map() {
        let new = map(&[("a", 1), ("b", 2)]);

        let diff = ModificationMap::diff(&ModificationMap::empty(), &new);
        assert_eq!(diff.added.len(), 2);
        assert!(diff.changed.is_empty());
        assert!(diff.removed.is_empty());
        assert!(diff.unchanged.is_empty());

        let diff = ModificationMap::diff(&new, &ModificationMap::empty());
        assert_eq!(diff.removed.len(), 2);
        assert!(diff.added.is_empty());
    }

    #[tokio::test]
    async fn test_rescan_of_untouched_files_is_empty_diff() {
        let dir = TempDir::new().unwrap();
        let files = FileSet::from_paths(vec![
            touch(&dir, "A.purs", 1_000),
            touch(&dir, "B.purs", 2_000),
        ]);

        let first = ModificationMap::scan(&files).await.unwrap();
        let second = ModificationMap::scan(&files).await.unwrap();

        let diff = ModificationMap::diff(&first, &second);
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_scan_picks_up_new_mtime() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "Main.purs", 1_000);
        let files = FileSet::from_paths(vec![path.clone()]);

        let before = ModificationMap::scan(&files).await.unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(5_000, 0)).unwrap();
        let after = ModificationMap::scan(&files).await.unwrap();

        assert_eq!(before.get(&path), Some(at(1_000)));
        assert_eq!(after.get(&path), Some(at(5_000)));
        assert_eq!(ModificationMap::diff(&before, &after).changed, vec![path]);
    }

    #[tokio::test]
    async fn test_scan_skips_vanished_file() {
        let dir = TempDir::new().unwrap();
        let kept = touch(&dir, "Kept.purs", 1_000);
        let gone = dir.path().join("Gone.purs");
        let files = FileSet::from_paths(vec![kept.clone(), gone.clone()]);

        let scanned = ModificationMap::scan(&files).await.unwrap();
        assert!(scanned.contains(&kept));
        assert!(!scanned.contains(&gone));
        assert_eq!(scanned.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_propagates_stat_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        let inner = locked.join("A.purs");
        std::fs::write(&inner, "module A where").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores directory permissions; nothing to assert in that case
        let readable = std::fs::metadata(&inner).is_ok();
        let result = ModificationMap::scan(&FileSet::from_paths(vec![inner])).await;

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if !readable {
            assert!(matches!(result, Err(BuildError::Io { .. })));
        }
    }
}
