use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Advisory exclusive lock on a file in the state directory.
///
/// Acquisition never fails: if the lock can't be taken within the timeout
/// (or the platform has no `flock`), the guard is returned unheld and the
/// caller carries on without mutual exclusion. Dropping a held guard
/// releases the lock.
pub struct StateLock {
    file: Option<File>,
}

impl StateLock {
    pub fn acquire(path: &Path, timeout: Duration) -> Self {
        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                debug!("creating lock dir {} failed: {e}", dir.display());
            }
        }
        let file = match OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
        {
            Ok(f) => f,
            Err(e) => {
                warn!("opening lock file {} failed, proceeding unlocked: {e}", path.display());
                return Self { file: None };
            }
        };

        let deadline = Instant::now() + timeout;
        loop {
            match try_lock(&file) {
                Ok(true) => return Self { file: Some(file) },
                Ok(false) => {}
                Err(e) => {
                    warn!("locking {} failed, proceeding unlocked: {e}", path.display());
                    return Self { file: None };
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    "timed out after {}ms waiting for {}, proceeding unlocked",
                    timeout.as_millis(),
                    path.display()
                );
                return Self { file: None };
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            unlock(&file);
        }
    }
}

/// `Ok(false)` when another process holds the lock.
#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<bool> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "advisory locking is not available on this platform",
    ))
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
