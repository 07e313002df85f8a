use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long a lock file may sit on disk before it is considered abandoned
/// by a crashed process and taken over.
const STALE_AFTER: Duration = Duration::from_secs(30);

/// Cross-process mutual exclusion via an exclusively-created lock file.
///
/// The queue and pool files are rewritten as whole-file operations, so every
/// writer serializes through the same `<file>.lock` sibling. Dropping the
/// guard releases the lock.
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquire the lock for `target`, waiting up to `timeout`.
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self, String> {
        let lock_path = lock_path_for(target);
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => return Ok(FileLock { lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    // A crashed writer leaves its lock behind; steal it once stale.
                    if lock_age(&lock_path).is_some_and(|age| age > STALE_AFTER) {
                        let _ = std::fs::remove_file(&lock_path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(format!(
                            "Timed out waiting for lock '{}'",
                            lock_path.display()
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    return Err(format!(
                        "Cannot create lock '{}': {}",
                        lock_path.display(),
                        e
                    ));
                }
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    name.push_str(".lock");
    target.with_file_name(name)
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    modified.elapsed().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_and_drop_removes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("queue.txt");
        let lock_file = dir.path().join("queue.txt.lock");

        {
            let _guard = FileLock::acquire(&target, Duration::from_secs(1)).unwrap();
            assert!(lock_file.exists());
        }
        assert!(!lock_file.exists());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("queue.txt");

        let _guard = FileLock::acquire(&target, Duration::from_secs(1)).unwrap();
        let second = FileLock::acquire(&target, Duration::from_millis(150));
        assert!(second.is_err());
    }

    #[test]
    fn reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pool.txt");

        drop(FileLock::acquire(&target, Duration::from_secs(1)).unwrap());
        assert!(FileLock::acquire(&target, Duration::from_secs(1)).is_ok());
    }
}
