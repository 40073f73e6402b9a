//! Exit code constants shared by the `locknloop` and `rangelock` binaries.
//!
//! The codes are a compatibility contract with existing callers:
//! - 0: Success
//! - 1: Lock unavailable (busy without a wait, or the wait timed out)
//! - 2: Usage / argument error
//! - 3: I/O, syscall, or locking-mechanism failure
//! - 4: Command exec failure (`rangelock` exec mode only)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// The lock is held elsewhere: the non-blocking probe failed with no wait
/// requested, or the wait deadline elapsed.
pub const LOCK_UNAVAILABLE: i32 = 1;

/// Bad arguments. clap reports its own parse failures with this code too.
pub const USAGE_ERROR: i32 = 2;

/// Unexpected OS-level failure: open, lock, fork, or loop device setup.
pub const SYSCALL_FAILURE: i32 = 3;

/// The caller's command could not be exec'd after the lock was taken.
pub const EXEC_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            LOCK_UNAVAILABLE,
            USAGE_ERROR,
            SYSCALL_FAILURE,
            EXEC_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn exit_codes_match_contract() {
        assert_eq!(SUCCESS, 0);
        assert_eq!(LOCK_UNAVAILABLE, 1);
        assert_eq!(USAGE_ERROR, 2);
        assert_eq!(SYSCALL_FAILURE, 3);
        assert_eq!(EXEC_FAILURE, 4);
    }
}
