//! Advisory filesystem lock over the metadata store (§5).
//!
//! Two concurrent mutating `mport` processes on the same database are not
//! supported; every install/delete/upgrade takes this lock for its
//! duration and releases it on every exit path, including a dropped
//! future/panic unwind, by tying the lock to the lifetime of a guard value
//! (the same RAII shape the original `Sysroot` used for its temp
//! directory).

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors acquiring the advisory lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock file could not be opened or locked at the OS level.
    #[error("IO error acquiring lock at {path}: {source}")]
    Io {
        /// The lock file path.
        path: PathBuf,
        /// The underlying IO failure.
        #[source]
        source: std::io::Error,
    },

    /// Another `mport` process already holds the lock.
    #[error("database at {0} is locked by another mport process")]
    WouldBlock(PathBuf),
}

/// Holds an exclusive advisory lock on `<db_path>.lock` for as long as it
/// is alive. The lock is released when the guard is dropped, however the
/// caller's scope is exited (normal return, early `?`, or panic unwind).
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquires the lock, blocking until it is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened or locked.
    pub fn acquire(db_path: &Path) -> Result<Self, LockError> {
        let path = lock_path(db_path);
        let file = open_lock_file(&path)?;
        flock(&file, libc::LOCK_EX).map_err(|source| LockError::Io { path: path.clone(), source })?;
        Ok(Self { file, path })
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::WouldBlock`] if another process holds the lock,
    /// or an IO error if the lock file cannot be opened.
    pub fn try_acquire(db_path: &Path) -> Result<Self, LockError> {
        let path = lock_path(db_path);
        let file = open_lock_file(&path)?;
        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Self { file, path }),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::WouldBlock(path))
            }
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    /// The lock file's path (`<db_path>.lock`).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = flock(&self.file, libc::LOCK_UN);
    }
}

fn lock_path(db_path: &Path) -> PathBuf {
    let mut path = db_path.as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LockError::Io { path: path.to_path_buf(), source })?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|source| LockError::Io { path: path.to_path_buf(), source })
}

/// Thin safe wrapper over `flock(2)`: the only syscall this crate binds
/// directly, used instead of a cross-platform lock crate because the core
/// targets Linux prefixes exclusively.
#[allow(unsafe_code)]
fn flock(file: &File, operation: libc::c_int) -> std::io::Result<()> {
    // SAFETY: `file`'s descriptor is valid for the duration of this call.
    let ret = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_blocks_a_second_holder() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mport.sqlite");

        let first = FileLock::try_acquire(&db_path).unwrap();
        let second = FileLock::try_acquire(&db_path);
        assert!(matches!(second, Err(LockError::WouldBlock(_))));

        drop(first);
        assert!(FileLock::try_acquire(&db_path).is_ok());
    }
}
