//! Single-run mutual exclusion via a PID file.
//!
//! On Unix the file is held with an advisory `flock` for the whole run. The
//! kernel drops it when the owner exits, so a lock left behind by a killed
//! run is free again without any cleanup, and two runs can never both take
//! over the same abandoned file. The PID written inside is informational.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::error::VaultError;

/// Held for the duration of one sync run. Dropping it removes the lock file.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    pid: u32,
    // Keeps the advisory lock alive.
    _file: File,
}

#[derive(Debug)]
pub enum LockAttempt {
    Acquired(RunLock),
    /// Another live run owns the lock.
    Held { pid: Option<u32> },
}

impl RunLock {
    /// Try to take the run lock at `path` without blocking.
    ///
    /// A holder older than `stale_after` is still a live process; it is
    /// reported as held and logged, never taken over.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<LockAttempt, VaultError> {
        let lock_err = |source| VaultError::Lock {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(lock_err)?;
        }

        for _ in 0..3 {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(lock_err)?;

            if !try_lock_exclusive(&file).map_err(lock_err)? {
                let holder = read_pid(path);
                if age(path).is_some_and(|age| age > stale_after) {
                    warn!(path = %path.display(), pid = ?holder, "run lock held longer than lock_stale_secs");
                }
                return Ok(LockAttempt::Held { pid: holder });
            }

            // The previous owner unlinks the file on release; a handle opened
            // just before that points at a dead inode.
            if !still_linked(&file, path) {
                continue;
            }

            let pid = std::process::id();
            if let Some(previous) = read_pid(path).filter(|&p| p != pid) {
                warn!(path = %path.display(), pid = previous, "reclaiming run lock left by an exited process");
            }
            write_pid(&file, pid).map_err(lock_err)?;
            debug!(path = %path.display(), pid, "run lock acquired");
            return Ok(LockAttempt::Acquired(RunLock {
                path: path.to_path_buf(),
                pid,
                _file: file,
            }));
        }

        // Kept losing to other processes re-creating the file.
        Ok(LockAttempt::Held {
            pid: read_pid(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Unlink while the advisory lock is still held, and only if the file
        // is still ours.
        if read_pid(&self.path) == Some(self.pid) {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), err = %e, "failed to remove run lock");
            } else {
                debug!(path = %self.path.display(), "run lock released");
            }
        }
    }
}

fn write_pid(mut file: &File, pid: u32) -> io::Result<()> {
    file.set_len(0)?;
    writeln!(file, "{pid}")?;
    file.sync_all()
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// `Ok(false)` when another open file description holds the lock.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // Safety: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    // No advisory locks; concurrent runs are not excluded here.
    Ok(true)
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(named)) => held.dev() == named.dev() && held.ino() == named.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn acquired(attempt: LockAttempt) -> RunLock {
        match attempt {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Held { pid } => panic!("lock held by {pid:?}"),
        }
    }

    fn backdate(path: &Path, by: Duration) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - by)
            .unwrap();
    }

    #[test]
    fn acquire_writes_pid_and_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vitalsync.lock");

        let lock = acquired(RunLock::acquire(&path, HOUR).unwrap());
        assert_eq!(read_pid(&path), Some(std::process::id()));
        assert_eq!(lock.path(), path);

        drop(lock);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn second_acquire_sees_live_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vitalsync.lock");

        let _lock = acquired(RunLock::acquire(&path, HOUR).unwrap());
        match RunLock::acquire(&path, HOUR).unwrap() {
            LockAttempt::Held { pid } => assert_eq!(pid, Some(std::process::id())),
            LockAttempt::Acquired(_) => panic!("lock acquired twice"),
        }
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn long_running_holder_is_not_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vitalsync.lock");

        let _lock = acquired(RunLock::acquire(&path, HOUR).unwrap());
        backdate(&path, 2 * HOUR);
        assert!(matches!(
            RunLock::acquire(&path, HOUR).unwrap(),
            LockAttempt::Held { .. }
        ));
    }

    #[test]
    fn leftover_lock_file_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vitalsync.lock");
        fs::write(&path, "not a pid").unwrap();

        let lock = acquired(RunLock::acquire(&path, HOUR).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", std::process::id()));
        drop(lock);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn dead_owner_is_reclaimed() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vitalsync.lock");
        fs::write(&path, format!("{dead_pid}\n")).unwrap();

        let lock = acquired(RunLock::acquire(&path, HOUR).unwrap());
        assert_eq!(read_pid(lock.path()), Some(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn racing_takeover_of_abandoned_lock_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vitalsync.lock");
        fs::write(&path, "999999999\n").unwrap();

        // The other run has already opened the abandoned file.
        let rival = File::options().read(true).write(true).open(&path).unwrap();

        let lock = acquired(RunLock::acquire(&path, HOUR).unwrap());
        assert!(!try_lock_exclusive(&rival).unwrap());
        assert!(matches!(
            RunLock::acquire(&path, HOUR).unwrap(),
            LockAttempt::Held { .. }
        ));
        assert_eq!(read_pid(&path), Some(std::process::id()));

        // Once released, the rival's handle names an unlinked file and must
        // not count as holding the lock.
        drop(lock);
        assert!(try_lock_exclusive(&rival).unwrap());
        assert!(!still_linked(&rival, &path));
        let next = acquired(RunLock::acquire(&path, HOUR).unwrap());
        assert!(still_linked(&next._file, &path));
    }

    #[test]
    fn drop_leaves_foreign_lock_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vitalsync.lock");
        let lock = acquired(RunLock::acquire(&path, HOUR).unwrap());

        fs::write(&path, "1\n").unwrap();
        drop(lock);
        assert_eq!(read_pid(&path), Some(1));
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(".vitalsync.lock");
        acquired(RunLock::acquire(&path, HOUR).unwrap());
    }
}
