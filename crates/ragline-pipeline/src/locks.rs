//! Filesystem-based locking and idempotency markers
//!
//! Mutual exclusion across worker tasks and across separate pipeline
//! processes sharing one input directory. The lock primitive is atomic
//! create-exclusive file creation; there is no in-process fallback, so the
//! same guarantees hold for concurrent processes.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix of the transient exclusivity marker
pub const LOCK_SUFFIX: &str = ".lock";
/// Suffix of the idempotency marker written after success
pub const PROCESSED_SUFFIX: &str = ".processed";

/// Append a suffix to the full file name (`a.pdf` -> `a.pdf.lock`)
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Path of the lock marker for an input file
pub fn lock_path(path: &Path) -> PathBuf {
    sibling(path, LOCK_SUFFIX)
}

/// Path of the processed marker for an input file
pub fn processed_path(path: &Path) -> PathBuf {
    sibling(path, PROCESSED_SUFFIX)
}

/// Coordinates `.lock` and `.processed` markers for one pipeline instance.
///
/// Tracks every lock it created so they can be removed en masse on batch
/// completion or interruption.
#[derive(Debug, Default)]
pub struct LockCoordinator {
    held: Mutex<HashSet<PathBuf>>,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to claim exclusive ownership of a file.
    ///
    /// Returns `false` when the lock file already exists. The create-exclusive
    /// open is the single source of truth; there is no separate existence
    /// check. Any other OS failure logs a warning and the task proceeds
    /// without a lock.
    pub fn acquire(&self, path: &Path) -> bool {
        let lock = lock_path(path);
        match OpenOptions::new().write(true).create_new(true).open(&lock) {
            Ok(mut file) => {
                let stamp = format!("locked at {}\n", chrono::Utc::now().to_rfc3339());
                if let Err(e) = file.write_all(stamp.as_bytes()) {
                    tracing::debug!("Could not write lock timestamp to {:?}: {}", lock, e);
                }
                self.held.lock().insert(lock);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => false,
            Err(e) => {
                tracing::warn!(
                    "Could not create lock file {:?} ({}); proceeding without a lock",
                    lock,
                    e
                );
                true
            }
        }
    }

    /// Release a lock. Idempotent: missing lock files are a no-op.
    pub fn release(&self, path: &Path) {
        let lock = lock_path(path);
        self.held.lock().remove(&lock);
        match std::fs::remove_file(&lock) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove lock file {:?}: {}", lock, e),
        }
    }

    /// Remove every lock file created by this coordinator instance.
    pub fn cleanup_all(&self) {
        let held: Vec<PathBuf> = self.held.lock().drain().collect();
        for lock in held {
            match std::fs::remove_file(&lock) {
                Ok(()) => tracing::debug!("Removed lock file {:?}", lock),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not remove lock file {:?}: {}", lock, e),
            }
        }
    }

    /// Number of locks currently held by this instance
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Whether a processed marker newer than `within` exists for the file
    pub fn is_recently_processed(&self, path: &Path, within: Duration) -> bool {
        let marker = processed_path(path);
        match std::fs::metadata(&marker).and_then(|m| m.modified()) {
            Ok(modified) => modified
                .elapsed()
                .map(|age| age <= within)
                .unwrap_or(true),
            Err(_) => false,
        }
    }

    /// Remove leftover markers from crashed prior runs.
    ///
    /// Scans the directory once at orchestrator startup and deletes `.lock`
    /// and `.processed` files whose mtime is older than `older_than`. A stale
    /// marker is treated as debris, not as work in progress.
    pub fn purge_stale_markers(&self, dir: &Path, older_than: Duration) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Could not scan {:?} for stale markers: {}", dir, e);
                return 0;
            }
        };

        let mut purged = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(LOCK_SUFFIX) && !name.ends_with(PROCESSED_SUFFIX) {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .map(|age| age >= older_than)
                .unwrap_or(false);
            if stale {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::info!("Purged stale marker {:?}", path);
                        purged += 1;
                    }
                    Err(e) => tracing::warn!("Could not purge stale marker {:?}: {}", path, e),
                }
            }
        }
        purged
    }
}
