//! Lock acquisition engine: whole-file exclusive open-file-description
//! locks.
//!
//! # Why OFD locks
//!
//! The lock is placed with `F_OFD_SETLK`/`F_OFD_SETLKW`, never the
//! traditional per-process `F_SETLK` record locks. OFD locks belong to
//! the open file description, so they survive `fork` and follow the
//! descriptor wherever it is handed: into the loop driver, into a
//! detached holder child, or across `execvp`. A per-process lock would be
//! dropped or silently re-entrant across those boundaries. On NFSv4
//! mounts the kernel coordinates the lock with the server, which is what
//! makes cross-machine exclusion work.
//!
//! # Probe first, then wait
//!
//! Acquisition always starts with a non-blocking probe. When the lock is
//! free, that is the whole story and the caller sees no output. Only when
//! the probe reports contention does the engine print a waiting notice
//! and fall back to a blocking wait bounded by a [`Deadline`].

use crate::error::{LockError, Result};
use crate::timeout::{Deadline, TimeoutSpec};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, fcntl};
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

/// Exclusive write lock over the whole file: offset 0, length 0 meaning
/// "to EOF and beyond". `l_pid` must be zero for OFD locks.
fn whole_file_write_lock() -> libc::flock {
    libc::flock {
        l_type: libc::F_WRLCK as libc::c_short,
        l_whence: libc::SEEK_SET as libc::c_short,
        l_start: 0,
        l_len: 0,
        l_pid: 0,
    }
}

/// A file opened for locking: the write-mode descriptor plus the path it
/// came from.
///
/// The descriptor is the unit of ownership. The lock placed on it lives
/// exactly as long as its open file description, so whoever ends up
/// holding this `File` (or a kernel-side reference to it) holds the lock.
#[derive(Debug)]
pub struct LockTarget {
    file: File,
    path: PathBuf,
}

impl LockTarget {
    /// Open `path` write-mode for locking.
    ///
    /// The file is not created: locking a lockfile that does not exist is
    /// a setup mistake the caller needs to hear about, not paper over.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::options().write(true).open(path).map_err(|err| {
            LockError::syscall(format!("Unable to open {}", path.display()), err)
        })?;
        Ok(LockTarget {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The locked descriptor, for attaching to a loop device.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Non-blocking probe for the exclusive whole-file lock.
    ///
    /// Returns `Ok(true)` when the lock was taken, `Ok(false)` when
    /// another open file description holds it.
    pub fn try_exclusive(&self) -> Result<bool> {
        let lock = whole_file_write_lock();
        match fcntl(self.file.as_raw_fd(), FcntlArg::F_OFD_SETLK(&lock)) {
            Ok(_) => Ok(true),
            Err(Errno::EWOULDBLOCK) => Ok(false),
            Err(err) => Err(LockError::syscall("Locking failure", err)),
        }
    }

    /// Blocking wait for the exclusive lock, bounded by `timeout`.
    ///
    /// Arms a [`Deadline`] around a single `F_OFD_SETLKW` call. When the
    /// deadline interrupts the wait the result is [`LockError::Timeout`];
    /// an `EINTR` from any other signal is a plain syscall failure. There
    /// is no retry either way: the controller is a one-shot cancellation,
    /// not a backoff scheme.
    pub fn wait_exclusive(&self, timeout: TimeoutSpec) -> Result<()> {
        let lock = whole_file_write_lock();
        let deadline = Deadline::arm(timeout)?;
        let outcome = fcntl(self.file.as_raw_fd(), FcntlArg::F_OFD_SETLKW(&lock));
        let expired = deadline.expired();
        drop(deadline);

        match outcome {
            Ok(_) => Ok(()),
            Err(Errno::EINTR) if expired => Err(LockError::Timeout),
            Err(err) => Err(LockError::syscall("Locking failure", err)),
        }
    }
}

/// Whether acquisition needed to wait. Callers use this for user
/// feedback only; the lock is equally held either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// The non-blocking probe succeeded outright.
    Immediate,
    /// The lock was busy and the bounded wait eventually succeeded.
    Waited,
}

/// Acquire the exclusive whole-file lock on `target`, waiting up to
/// `timeout` when it is busy.
///
/// The waiting notice goes to stderr, and only when a real wait is about
/// to happen; an uncontended acquisition stays silent.
pub fn acquire_exclusive(target: &LockTarget, timeout: TimeoutSpec) -> Result<Acquisition> {
    if target.try_exclusive()? {
        return Ok(Acquisition::Immediate);
    }
    if timeout.is_immediate() {
        return Err(LockError::Busy);
    }

    eprintln!(
        "File is currently locked by another process. Waiting for {timeout} seconds..."
    );
    target.wait_exclusive(timeout)?;
    Ok(Acquisition::Waited)
}
