//! Deadline control for the blocking lock wait.
//!
//! The engine's blocking `fcntl` can only be cancelled by a signal. A
//! [`Deadline`] arms a one-shot POSIX timer that delivers `SIGALRM` to the
//! arming thread; the handler does nothing but set an atomic token. The
//! interrupted wait then observes `EINTR`, checks the token, and reports a
//! typed timeout instead of a generic failure.
//!
//! There is exactly one in-flight deadline per invocation. Deadlines are
//! never nested or reused: arm, wait once, drop.

use crate::error::{LockError, Result};
use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::fmt;
use std::mem;
use std::ptr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// How long a caller is willing to wait for a busy lock, in whole seconds.
///
/// Zero means "fail immediately if unavailable". Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSpec {
    seconds: u32,
}

impl TimeoutSpec {
    /// Fail immediately when the lock is busy.
    pub const IMMEDIATE: TimeoutSpec = TimeoutSpec { seconds: 0 };

    pub fn from_secs(seconds: u32) -> Self {
        TimeoutSpec { seconds }
    }

    /// True when no waiting was requested.
    pub fn is_immediate(&self) -> bool {
        self.seconds == 0
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }
}

impl fmt::Display for TimeoutSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seconds)
    }
}

impl FromStr for TimeoutSpec {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u32>()
            .map(TimeoutSpec::from_secs)
            .map_err(|_| LockError::Usage("Invalid timeout value".to_string()))
    }
}

/// Cancellation token set by the timer callback and nothing else.
static DEADLINE_EXPIRED: AtomicBool = AtomicBool::new(false);

/// `SIGALRM` handler. Only async-signal-safe work happens here; the
/// blocked syscall sees `EINTR` and does the actual error translation.
extern "C" fn note_deadline(_signum: libc::c_int) {
    DEADLINE_EXPIRED.store(true, Ordering::SeqCst);
}

/// A one-shot armed deadline. Dropping it disarms the timer.
///
/// Holds a raw kernel timer handle, so it is neither `Send` nor `Sync`;
/// the deadline belongs to the thread that armed it.
#[derive(Debug)]
pub struct Deadline {
    timer: libc::timer_t,
}

impl Deadline {
    /// Arm a deadline of `timeout` seconds against the calling thread.
    ///
    /// Installs the `SIGALRM` action and starts a `CLOCK_MONOTONIC` timer
    /// whose expiry is delivered to this thread specifically, so the
    /// signal interrupts the syscall that is about to block here and not
    /// some other thread in the process.
    pub fn arm(timeout: TimeoutSpec) -> Result<Deadline> {
        debug_assert!(!timeout.is_immediate(), "a zero deadline would never fire");

        DEADLINE_EXPIRED.store(false, Ordering::SeqCst);

        // SA_RESTART stays unset: the pending fcntl must come back with
        // EINTR instead of being transparently restarted.
        let action = SigAction::new(
            SigHandler::Handler(note_deadline),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe { sigaction(Signal::SIGALRM, &action) }
            .map_err(|err| LockError::syscall("Unable to set signal handler", err))?;

        let mut event: libc::sigevent = unsafe { mem::zeroed() };
        event.sigev_notify = libc::SIGEV_THREAD_ID;
        event.sigev_signo = libc::SIGALRM;
        event.sigev_notify_thread_id = unsafe { libc::gettid() };

        let mut timer: libc::timer_t = ptr::null_mut();
        if unsafe { libc::timer_create(libc::CLOCK_MONOTONIC, &mut event, &mut timer) } == -1 {
            return Err(LockError::syscall(
                "Unable to create deadline timer",
                Errno::last(),
            ));
        }

        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: libc::timespec {
                tv_sec: timeout.seconds() as libc::time_t,
                tv_nsec: 0,
            },
        };
        if unsafe { libc::timer_settime(timer, 0, &spec, ptr::null_mut()) } == -1 {
            let err = Errno::last();
            unsafe { libc::timer_delete(timer) };
            return Err(LockError::syscall("Unable to arm deadline timer", err));
        }

        Ok(Deadline { timer })
    }

    /// True once the deadline has fired.
    pub fn expired(&self) -> bool {
        DEADLINE_EXPIRED.load(Ordering::SeqCst)
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        // Deleting the timer disarms it; a later EINTR can no longer be
        // mistaken for this deadline.
        unsafe {
            libc::timer_delete(self.timer);
        }
    }
}
