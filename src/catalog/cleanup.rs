//! Filesystem housekeeping for the songs directory.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use super::entry::RENDITION_FILENAME;

/// Remove song directories that no catalog entry claims. Returns the
/// number of directories removed.
pub fn remove_orphan_dirs(songs_dir: &Path, known: &HashSet<String>) -> usize {
    let read_dir = match fs::read_dir(songs_dir) {
        Ok(read_dir) => read_dir,
        Err(err) => {
            warn!("Could not scan {:?} for orphans: {}", songs_dir, err);
            return 0;
        }
    };

    let mut removed = 0;
    for dir_entry in read_dir.flatten() {
        let path = dir_entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = dir_entry.file_name().to_string_lossy().to_string();
        if known.contains(&name) {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!("Removed orphan directory {:?}", path);
                removed += 1;
            }
            Err(err) => warn!("Could not remove orphan {:?}: {}", path, err),
        }
    }
    removed
}

/// Remove generated renditions older than `keep_days`. A negative value
/// disables pruning, zero removes every rendition. Returns the number of
/// files removed.
pub fn prune_renditions(songs_dir: &Path, keep_days: i64) -> usize {
    if keep_days < 0 {
        return 0;
    }
    let cutoff = SystemTime::now() - Duration::from_secs(keep_days as u64 * 24 * 60 * 60);

    let read_dir = match fs::read_dir(songs_dir) {
        Ok(read_dir) => read_dir,
        Err(err) => {
            warn!("Could not scan {:?} for old renditions: {}", songs_dir, err);
            return 0;
        }
    };

    let mut removed = 0;
    for dir_entry in read_dir.flatten() {
        let rendition = dir_entry.path().join(RENDITION_FILENAME);
        let Ok(meta) = fs::metadata(&rendition) else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified > cutoff {
            continue;
        }
        match fs::remove_file(&rendition) {
            Ok(()) => {
                debug!("Pruned old rendition {:?}", rendition);
                removed += 1;
            }
            Err(err) => warn!("Could not prune {:?}: {}", rendition, err),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphan_dirs_are_removed_and_known_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("keep")).unwrap();
        fs::create_dir(dir.path().join("orphan")).unwrap();
        fs::write(dir.path().join("orphan/file"), b"x").unwrap();

        let known: HashSet<String> = ["keep".to_string()].into_iter().collect();
        let removed = remove_orphan_dirs(dir.path(), &known);

        assert_eq!(removed, 1);
        assert!(dir.path().join("keep").exists());
        assert!(!dir.path().join("orphan").exists());
    }

    #[test]
    fn test_negative_keep_days_disables_pruning() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("aaaa")).unwrap();
        fs::write(dir.path().join("aaaa").join(RENDITION_FILENAME), b"mp3").unwrap();

        assert_eq!(prune_renditions(dir.path(), -1), 0);
        assert!(dir.path().join("aaaa").join(RENDITION_FILENAME).exists());
    }

    #[test]
    fn test_zero_keep_days_prunes_everything() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("aaaa")).unwrap();
        fs::write(dir.path().join("aaaa").join(RENDITION_FILENAME), b"mp3").unwrap();
        fs::write(dir.path().join("aaaa").join("original.mp3"), b"src").unwrap();

        assert_eq!(prune_renditions(dir.path(), 0), 1);
        assert!(!dir.path().join("aaaa").join(RENDITION_FILENAME).exists());
        // The source audio is never touched.
        assert!(dir.path().join("aaaa").join("original.mp3").exists());
    }
}
