//! Container-wide advisory lock, used to serialize `pack_all_loose` and other
//! global maintenance across processes. `add_object*` and reads never take
//! this lock: they rely on atomic rename (loose) and append-then-commit
//! (packed) for their own safety.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// How long [`ContainerLock::acquire`] retries before giving up.
const ACQUIRE_GRACE: Duration = Duration::from_secs(30);
const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// A held exclusive lock on the container root's `.lock` file. Released when
/// dropped.
pub struct ContainerLock {
    file: File,
    path: PathBuf,
}

impl ContainerLock {
    /// Block (with a grace period, not forever) until the exclusive lock on
    /// `root/.lock` is acquired.
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(".lock");
        let file = OpenOptions::new().create(true).write(true).open(&path)?;
        let deadline = Instant::now() + ACQUIRE_GRACE;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(ContainerLock { file, path }),
                Err(_) if Instant::now() < deadline => std::thread::sleep(RETRY_INTERVAL),
                Err(e) => {
                    return Err(Error::Concurrency(format!(
                        "failed to acquire container lock at {}: {e}",
                        path.display()
                    )))
                }
            }
        }
    }
}

impl Drop for ContainerLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = &self.path; // kept for diagnostics / future error messages
    }
}
