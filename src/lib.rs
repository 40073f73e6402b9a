//! Exclusive, NFSv4-compatible advisory locking of a regular file, plus
//! what happens to the lock afterwards.
//!
//! The crate backs two small binaries:
//!
//! - `locknloop` locks a file and attaches it to a free kernel loop
//!   device, so cooperating hosts on a network filesystem can coordinate
//!   access to a shared image before mapping it as a block device.
//! - `rangelock` locks a file and either parks the lock in a detached
//!   holder process or execs a command that inherits it.
//!
//! All locking uses open-file-description locks (`F_OFD_SETLK`), never
//! per-process record locks. That is a correctness requirement, not a
//! style choice: the lock must survive `fork` and must stay alive as long
//! as the open file description does, whether that description ends up
//! inside the loop driver, a holder child, or an exec'd command.

pub mod error;
pub mod exit_codes;
pub mod holder;
pub mod lock;
pub mod loopdev;
pub mod timeout;
