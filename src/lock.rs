//! Advisory file locking for write-class protocols.
//!
//! Writers serialize on an exclusive flock held on the document file
//! itself. When the target does not exist yet, a placeholder file
//! containing a sentinel string is written first so the lock has
//! something to attach to; if the guarded block never writes real data,
//! the placeholder is removed again on the way out.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Sentinel content marking a lock-slot file that holds no real data.
pub const PLACEHOLDER: &str = "__flight_config_placeholder__";

/// How long a writer waits for the exclusive lock before giving up.
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(100);

const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Run `body` with an exclusive advisory lock held on `path`.
///
/// The lock is released (and any still-empty placeholder removed) on
/// every exit path, including errors raised by `body`.
///
/// # Errors
///
/// Returns [`Error::ResourceBusy`] if the lock cannot be acquired within
/// [`LOCK_TIMEOUT`]; filesystem errors on create/open propagate as-is.
pub fn with_lock<R, F>(path: &Path, body: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    let mut placeholder = false;
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, PLACEHOLDER)?;
        placeholder = true;
        tracing::info!(path = %path.display(), "placeholder");
    }

    let result = (|| {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        lock_exclusive(&file, path)?;
        // Dropping the handle at the end of this closure releases the lock.
        body()
    })();

    if placeholder {
        remove_if_placeholder(path);
    }
    result
}

/// Poll for the exclusive lock until [`LOCK_TIMEOUT`] elapses.
fn lock_exclusive(file: &File, path: &Path) -> Result<()> {
    let contended = fs2::lock_contended_error();
    let deadline = Instant::now() + LOCK_TIMEOUT;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(err) if err.raw_os_error() == contended.raw_os_error() => {
                if Instant::now() >= deadline {
                    return Err(Error::ResourceBusy(path.to_path_buf()));
                }
                thread::sleep(RETRY_INTERVAL);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Delete `path` if it still contains exactly the sentinel.
fn remove_if_placeholder(path: &Path) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    if content == PLACEHOLDER {
        match fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "placeholder (removed)"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "placeholder cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn creates_and_removes_placeholder_when_nothing_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/doc.yaml");

        with_lock(&path, || {
            assert_eq!(fs::read_to_string(&path).unwrap(), PLACEHOLDER);
            Ok(())
        })
        .unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn keeps_file_when_body_writes_real_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");

        with_lock(&path, || {
            fs::write(&path, "key: value\n")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "key: value\n");
    }

    #[test]
    fn removes_placeholder_when_body_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");

        let result: Result<()> = with_lock(&path, || Err(Error::EmptyKeyPath));

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn leaves_existing_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");
        fs::write(&path, "key: value\n").unwrap();

        with_lock(&path, || Ok(())).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "key: value\n");
    }

    #[test]
    fn contended_lock_fails_busy_within_deadline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");
        fs::write(&path, "key: value\n").unwrap();

        let holder = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        holder.try_lock_exclusive().unwrap();

        let started = Instant::now();
        let result = with_lock(&path, || Ok(()));
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(Error::ResourceBusy(p)) if p == path));
        assert!(elapsed >= LOCK_TIMEOUT);
        assert!(elapsed < LOCK_TIMEOUT * 20);
    }

    #[test]
    fn lock_released_after_body_returns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");
        fs::write(&path, "key: value\n").unwrap();

        with_lock(&path, || Ok(())).unwrap();

        let probe = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        probe.try_lock_exclusive().unwrap();
    }
}
