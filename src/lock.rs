//! File locking and atomic writes for tix
//!
//! Every read-modify-write of the task file or the history file runs inside
//! a [`critical_section`]: an exclusive advisory lock (fs2/flock) on a
//! sibling `<file>.lock`, held until the closure returns. Writes inside the
//! section go through [`write_atomic`] (temp file + rename), so readers see
//! either the old or the new file, never a partial one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Default retry interval when waiting for a lock
const LOCK_RETRY_INTERVAL_MS: u64 = 50;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, fs2/libc can surface lock/sharing violations as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// A file lock guard that releases the lock when dropped
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock on a file with timeout
    ///
    /// The lock file is created if missing.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);
        let mut waited = false;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock { file });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    if !waited {
                        tracing::debug!(lock = %path.display(), "waiting for lock");
                        waited = true;
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => {
                    return Err(Error::Io(e));
                }
            }
        }
    }

}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// Lock file guarding `path`: `<path>.lock`
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

/// Run `f` while holding the exclusive lock that guards `path`.
///
/// Not reentrant: `f` must not open another critical section on the same
/// path.
pub fn critical_section<T>(
    path: &Path,
    timeout_ms: u64,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let _lock = FileLock::acquire(lock_path_for(path), timeout_ms)?;
    f()
}

/// Atomically write data to a file
///
/// Writes a temp file in the same directory, then renames it over the
/// target. Does not lock; callers run it inside a [`critical_section`].
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_file_lock_acquire_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("tasks.json.lock");

        let lock = FileLock::acquire(&lock_path, 1000).unwrap();
        assert!(lock_path.exists());

        assert!(matches!(
            FileLock::acquire(&lock_path, 20),
            Err(Error::LockFailed(_))
        ));

        drop(lock);

        assert!(FileLock::acquire(&lock_path, 20).is_ok());
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("tasks.json");

        write_atomic(&file_path, b"{\"next_id\": 1}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"next_id\": 1}");

        write_atomic(&file_path, b"{\"next_id\": 2}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"next_id\": 2}");
    }

    #[test]
    fn timeout_returns_lock_failed() {
        let temp_dir = TempDir::new().unwrap();
        let data_path = temp_dir.path().join("history.json");

        let _lock = FileLock::acquire(lock_path_for(&data_path), 1000).unwrap();
        let result = critical_section(&data_path, 50, || Ok(()));
        assert!(matches!(result, Err(Error::LockFailed(_))));
    }

    #[test]
    fn critical_sections_do_not_overlap() {
        let temp_dir = TempDir::new().unwrap();
        let data_path = temp_dir.path().join("tasks.json");

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(threads);
        for _ in 0..threads {
            let barrier = Arc::clone(&barrier);
            let in_section = Arc::clone(&in_section);
            let max_concurrent = Arc::clone(&max_concurrent);
            let data_path = data_path.clone();

            handles.push(thread::spawn(move || {
                barrier.wait();
                critical_section(&data_path, 2000, || {
                    let current = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = max_concurrent.fetch_max(current, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    in_section.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }
}
