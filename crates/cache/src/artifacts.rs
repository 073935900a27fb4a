//! On-disk artifact directory management.
//!
//! Every job owns one directory, `<root>/<job_id>/`, holding all files its
//! producer wrote. [`ArtifactStore`] is the only component that touches
//! these directories: it creates them for workers, enumerates produced
//! files after a successful run, answers liveness/size queries for the
//! cache, and deletes directories when their cache entry expires or the
//! startup sweep finds them orphaned.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use mediavault_core::JobId;

/// Owns the artifact root directory and all per-job subdirectories.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`, creating the directory if missing.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The artifact root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the directory owned by `job_id`.
    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    /// Create a fresh artifact directory for `job_id`.
    pub fn create_job_dir(&self, job_id: JobId) -> io::Result<PathBuf> {
        let dir = self.job_dir(job_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Recursively delete the directory owned by `job_id`.
    ///
    /// Idempotent: the directory already being gone is not an error.
    /// Returns whether anything was actually removed.
    pub fn remove_job_dir(&self, job_id: JobId) -> io::Result<bool> {
        let dir = self.job_dir(job_id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether every relative path in `files` currently exists under the
    /// job's directory. An empty list is vacuously live.
    pub fn files_exist(&self, job_id: JobId, files: &[String]) -> bool {
        let dir = self.job_dir(job_id);
        files.iter().all(|rel| dir.join(rel).is_file())
    }

    /// Size in bytes of one produced file, if it exists.
    pub fn file_size(&self, job_id: JobId, rel: &str) -> Option<u64> {
        std::fs::metadata(self.job_dir(job_id).join(rel))
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    /// Total size in bytes of the listed produced files (missing files
    /// contribute zero).
    pub fn total_size(&self, job_id: JobId, files: &[String]) -> u64 {
        files
            .iter()
            .filter_map(|rel| self.file_size(job_id, rel))
            .sum()
    }

    /// Recursively enumerate all regular files under the job's directory,
    /// returned as sorted paths relative to it.
    ///
    /// A job that exits successfully but produces no files is treated as
    /// failed by the worker, so callers check for an empty result. A
    /// non-UTF-8 file name is an error: a lossily recorded name could never
    /// pass the liveness check again, leaving a permanently stale entry.
    pub fn enumerate_files(&self, job_id: JobId) -> io::Result<Vec<String>> {
        let dir = self.job_dir(job_id);
        let mut files = Vec::new();
        let mut stack = vec![dir.clone()];

        while let Some(current) = stack.pop() {
            for entry in std::fs::read_dir(&current)? {
                let entry = entry?;
                let path = entry.path();
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() {
                    // Paths under `dir` by construction; strip_prefix cannot fail.
                    if let Ok(rel) = path.strip_prefix(&dir) {
                        match rel.to_str() {
                            Some(rel) => files.push(rel.to_owned()),
                            None => {
                                return Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    format!(
                                        "Produced file name is not valid UTF-8: {}",
                                        rel.to_string_lossy()
                                    ),
                                ));
                            }
                        }
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Delete every immediate subdirectory of the root whose last-modified
    /// time is strictly older than `ttl`.
    ///
    /// Runs once at startup, before the service accepts submissions. Its
    /// purpose is reclaiming storage for artifacts whose cache entries were
    /// lost to a restart. Returns the number of directories removed.
    pub fn sweep_on_startup(&self, ttl: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Skipping unreadable artifact directory during sweep",
                    );
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > ttl {
                match std::fs::remove_dir_all(entry.path()) {
                    Ok(()) => {
                        removed += 1;
                        tracing::info!(
                            path = %entry.path().display(),
                            age_secs = age.as_secs(),
                            "Swept stale artifact directory",
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %entry.path().display(),
                            error = %e,
                            "Failed to sweep stale artifact directory",
                        );
                    }
                }
            }
        }

        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("artifacts")).unwrap();
        (tmp, store)
    }

    fn write_file(dir: &Path, rel: &str, contents: &[u8]) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    // -- directory lifecycle --------------------------------------------------

    #[test]
    fn create_and_remove_job_dir() {
        let (_tmp, store) = store();
        let job_id = uuid::Uuid::now_v7();

        let dir = store.create_job_dir(job_id).unwrap();
        assert!(dir.is_dir());

        assert!(store.remove_job_dir(job_id).unwrap());
        assert!(!dir.exists());
    }

    #[test]
    fn remove_missing_dir_is_not_an_error() {
        let (_tmp, store) = store();
        let removed = store.remove_job_dir(uuid::Uuid::now_v7()).unwrap();
        assert!(!removed);
    }

    // -- enumeration ----------------------------------------------------------

    #[test]
    fn enumerate_finds_nested_files_sorted() {
        let (_tmp, store) = store();
        let job_id = uuid::Uuid::now_v7();
        let dir = store.create_job_dir(job_id).unwrap();

        write_file(&dir, "video.mp4", b"vv");
        write_file(&dir, "subs/en.srt", b"ss");
        write_file(&dir, "audio.m4a", b"aa");

        let files = store.enumerate_files(job_id).unwrap();
        assert_eq!(files, vec!["audio.m4a", "subs/en.srt", "video.mp4"]);
    }

    #[cfg(unix)]
    #[test]
    fn enumerate_rejects_non_utf8_file_names() {
        use std::os::unix::ffi::OsStrExt;

        let (_tmp, store) = store();
        let job_id = uuid::Uuid::now_v7();
        let dir = store.create_job_dir(job_id).unwrap();
        let name = std::ffi::OsStr::from_bytes(b"clip\xff.mp4");
        std::fs::write(dir.join(name), b"vv").unwrap();

        let err = store.enumerate_files(job_id).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn enumerate_empty_dir_returns_empty() {
        let (_tmp, store) = store();
        let job_id = uuid::Uuid::now_v7();
        store.create_job_dir(job_id).unwrap();
        assert!(store.enumerate_files(job_id).unwrap().is_empty());
    }

    // -- liveness and size ----------------------------------------------------

    #[test]
    fn files_exist_checks_every_path() {
        let (_tmp, store) = store();
        let job_id = uuid::Uuid::now_v7();
        let dir = store.create_job_dir(job_id).unwrap();
        write_file(&dir, "video.mp4", b"vv");

        assert!(store.files_exist(job_id, &["video.mp4".into()]));
        assert!(!store.files_exist(job_id, &["video.mp4".into(), "gone.srt".into()]));
    }

    #[test]
    fn total_size_sums_existing_files() {
        let (_tmp, store) = store();
        let job_id = uuid::Uuid::now_v7();
        let dir = store.create_job_dir(job_id).unwrap();
        write_file(&dir, "a.bin", &[0u8; 10]);
        write_file(&dir, "b.bin", &[0u8; 32]);

        let files = vec!["a.bin".to_string(), "b.bin".to_string(), "gone".to_string()];
        assert_eq!(store.total_size(job_id, &files), 42);
        assert_eq!(store.file_size(job_id, "a.bin"), Some(10));
        assert_eq!(store.file_size(job_id, "gone"), None);
    }

    // -- startup sweep --------------------------------------------------------

    #[test]
    fn sweep_removes_only_directories_older_than_ttl() {
        let (_tmp, store) = store();
        let old_id = uuid::Uuid::now_v7();
        let fresh_id = uuid::Uuid::now_v7();
        let old_dir = store.create_job_dir(old_id).unwrap();
        let fresh_dir = store.create_job_dir(fresh_id).unwrap();

        // Backdate the old directory's mtime well past the TTL.
        let past = SystemTime::now() - Duration::from_secs(3600);
        let times = std::fs::FileTimes::new().set_modified(past);
        std::fs::File::open(&old_dir).unwrap().set_times(times).unwrap();

        let removed = store.sweep_on_startup(Duration::from_secs(60)).unwrap();
        assert_eq!(removed, 1);
        assert!(!old_dir.exists());
        assert!(fresh_dir.exists());
    }

    #[test]
    fn sweep_ignores_regular_files_in_root() {
        let (_tmp, store) = store();
        std::fs::write(store.root().join("stray.txt"), b"x").unwrap();
        let removed = store.sweep_on_startup(Duration::from_secs(0)).unwrap();
        assert_eq!(removed, 0);
        assert!(store.root().join("stray.txt").exists());
    }
}
