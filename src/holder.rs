//! Process lifecycle after acquisition: who keeps the lock alive.
//!
//! Two distinct operations, deliberately not one overloaded call:
//!
//! - [`spawn_holder`] forks a detached child that holds the lock purely
//!   by keeping its inherited descriptor open while suspended. The parent
//!   reports the child's pid and is free to exit.
//! - [`exec_command`] replaces the current process image with a
//!   caller-specified command. The locked descriptor is passed in
//!   explicitly and marked inheritable, so the command can use or close
//!   it as it sees fit.
//!
//! Both rely on the same OFD property: the lock belongs to the open file
//! description, so a fork-inherited or exec-surviving descriptor keeps it
//! held without any further cooperation.

use crate::error::{LockError, Result};
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::unistd::{self, ForkResult, Pid, execvp, fork};
use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::fs::File;
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;

/// Fork a child that holds the lock until it is terminated externally.
///
/// The parent gets the child's pid back immediately; printing it and
/// exiting makes the tool non-blocking from the caller's point of view
/// while the lock stays held. Fork failure simply releases the lock when
/// the process exits. Close-on-exec flags are irrelevant here: fork
/// duplicates every descriptor regardless.
pub fn spawn_holder() -> Result<Pid> {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(child),
        Ok(ForkResult::Child) => {
            // No way to report failures from in here. Stdio is closed so
            // the caller's pipeline is not held open; the lock needs
            // nothing but the inherited descriptor and a live process.
            // close_range would also drop inherited extras, but older
            // kernels lack it.
            let _ = unistd::close(0);
            let _ = unistd::close(1);
            let _ = unistd::close(2);
            loop {
                unistd::pause();
            }
        }
        Err(err) => Err(LockError::syscall("Unable to fork", err)),
    }
}

/// Replace the current process image with `command`, argv-style: the
/// first word is the program (resolved through `PATH`), the rest its
/// arguments.
///
/// `lock` is the descriptor the new image inherits. Rust opens files
/// close-on-exec, so the flag is cleared here first; without that the
/// exec would silently close the descriptor and release the lock the
/// command was supposed to hold.
///
/// Returns only on failure; on success the new image owns the process,
/// locked descriptor included.
pub fn exec_command(lock: &File, command: &[OsString]) -> Result<Infallible> {
    let program = command
        .first()
        .ok_or_else(|| LockError::Usage("No command given".to_string()))?;

    let argv = command
        .iter()
        .map(|word| {
            CString::new(word.as_bytes()).map_err(|_| {
                LockError::Usage("Command arguments must not contain NUL bytes".to_string())
            })
        })
        .collect::<Result<Vec<_>>>()?;

    fcntl(lock.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::empty()))
        .map_err(|err| LockError::syscall("Unable to share the locked descriptor", err))?;

    match execvp(&argv[0], &argv) {
        Ok(void) => match void {},
        Err(err) => Err(LockError::Exec {
            command: program.to_string_lossy().into_owned(),
            source: err.into(),
        }),
    }
}
