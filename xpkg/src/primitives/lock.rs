//! Advisory file locking for the pkgdb and per-repository repodata. The pkgdb lock is non-blocking on the first attempt and
//! surfaces `EBUSY` immediately; repo locks block, notifying the caller
//! once via an optional callback after the first refusal.
//!
//! We take `flock(2)` directly via `libc` rather than a scoped-guard crate:
//! the lock needs to be held for the whole lifetime of the owning object
//! (a pkgdb session, a repo session), not for one block of code, and
//! `flock` releases automatically when the file descriptor is closed, which
//! `Drop`-ping the owned `File` gives us for free.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{ErrorKind, Reason};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file '{0}' is held by another process")]
    Busy(PathBuf),

    #[error("I/O error locking '{0}'")]
    Io(PathBuf, #[source] io::Error),
}

impl ErrorKind for LockError {
    fn kind(&self) -> Reason {
        match self {
            LockError::Busy(_) => Reason::Busy,
            LockError::Io(..) => Reason::Resource,
        }
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).write(true).open(path)
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    // SAFETY: `file` owns a valid, open file descriptor for the duration of
    // this call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn is_would_block(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(code) if code == libc::EWOULDBLOCK)
}

/// A lock held for the duration of a single pkgdb-mutating session.
/// Acquisition is non-blocking: if another writer holds it, this fails
/// immediately with [`LockError::Busy`].
pub struct PkgdbLock {
    path: PathBuf,
    // Kept open for the lifetime of this struct; the flock is released when
    // the descriptor is closed on drop.
    _file: File,
}

impl PkgdbLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let file = open_lock_file(&path).map_err(|e| LockError::Io(path.clone(), e))?;

        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(PkgdbLock { path, _file: file }),
            Err(e) if is_would_block(&e) => Err(LockError::Busy(path)),
            Err(e) => Err(LockError::Io(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A lock over a repository's `<arch>-repodata`, used by repo-authoring
/// tools. The client only ever takes read access to repository data during
/// a transaction, so this type exists mainly for repo-authoring
/// tooling built on top of this crate.
pub struct RepoLock {
    path: PathBuf,
    _file: File,
}

impl RepoLock {
    /// Blocks until the lock is acquired, invoking `on_wait` once if the
    /// first non-blocking attempt fails.
    pub fn acquire(path: impl Into<PathBuf>, on_wait: impl FnOnce()) -> Result<Self, LockError> {
        let path = path.into();
        let file = open_lock_file(&path).map_err(|e| LockError::Io(path.clone(), e))?;

        if let Err(e) = flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            if !is_would_block(&e) {
                return Err(LockError::Io(path, e));
            }
            on_wait();
            flock(&file, libc::LOCK_EX).map_err(|e| LockError::Io(path.clone(), e))?;
        }

        Ok(RepoLock { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "lock.test.rs"]
mod test;
