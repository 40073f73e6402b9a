//! Error types for the locking tools.
//!
//! Uses thiserror for derive macros. Every failure is terminal for the
//! invoking process: the binaries print one diagnostic line to stderr and
//! exit with the code reported by [`LockError::exit_code`]. Retrying is
//! left to whatever supervises the tool.

use crate::exit_codes;
use std::io;
use thiserror::Error;

/// Main error type for lock acquisition and lock handoff.
///
/// Each variant maps to a specific exit code so callers can distinguish
/// "the lock is taken" from "the machinery broke" from "your command
/// never ran".
#[derive(Error, Debug)]
pub enum LockError {
    /// Arguments were malformed in a way clap could not catch.
    #[error("{0}")]
    Usage(String),

    /// The non-blocking probe found the file locked and no wait was
    /// requested.
    #[error("The file is locked by another process!")]
    Busy,

    /// The deadline elapsed while waiting for the lock.
    #[error("File is still locked!")]
    Timeout,

    /// An unexpected OS-level failure while opening, locking, or binding.
    #[error("{context}: {source}")]
    Syscall {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Replacing the process image with the requested command failed.
    #[error("Unable to start {command}: {source}")]
    Exec {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    /// Build a [`LockError::Syscall`] from any OS error source.
    pub fn syscall(context: impl Into<String>, source: impl Into<io::Error>) -> Self {
        LockError::Syscall {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Returns the appropriate exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Usage(_) => exit_codes::USAGE_ERROR,
            LockError::Busy | LockError::Timeout => exit_codes::LOCK_UNAVAILABLE,
            LockError::Syscall { .. } => exit_codes::SYSCALL_FAILURE,
            LockError::Exec { .. } => exit_codes::EXEC_FAILURE,
        }
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_error_has_correct_exit_code() {
        let err = LockError::Usage("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    }

    #[test]
    fn busy_and_timeout_share_the_unavailable_exit_code() {
        assert_eq!(LockError::Busy.exit_code(), exit_codes::LOCK_UNAVAILABLE);
        assert_eq!(LockError::Timeout.exit_code(), exit_codes::LOCK_UNAVAILABLE);
    }

    #[test]
    fn syscall_error_has_correct_exit_code() {
        let err = LockError::syscall(
            "Unable to open /tmp/x",
            io::Error::from_raw_os_error(libc::ENOENT),
        );
        assert_eq!(err.exit_code(), exit_codes::SYSCALL_FAILURE);
    }

    #[test]
    fn exec_error_has_correct_exit_code() {
        let err = LockError::Exec {
            command: "frobnicate".to_string(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert_eq!(err.exit_code(), exit_codes::EXEC_FAILURE);
    }

    #[test]
    fn busy_and_timeout_messages_differ() {
        // Same exit code, but the operator must be able to tell whether a
        // wait happened at all.
        assert_ne!(LockError::Busy.to_string(), LockError::Timeout.to_string());
    }

    #[test]
    fn syscall_message_carries_context_and_os_error() {
        let err = LockError::syscall(
            "Unable to open /tmp/x",
            io::Error::from_raw_os_error(libc::ENOENT),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Unable to open /tmp/x: "));
        assert!(msg.len() > "Unable to open /tmp/x: ".len());
    }

    #[test]
    fn exec_message_names_the_command() {
        let err = LockError::Exec {
            command: "frobnicate".to_string(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert!(err.to_string().contains("frobnicate"));
    }
}
