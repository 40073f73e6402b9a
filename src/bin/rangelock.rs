//! `rangelock`: exclusively lock a file, then hold the lock in a
//! detached process or hand it to an exec'd command.
//!
//! With no command, a child is forked to keep the lock alive and its PID
//! is printed; the tool itself returns immediately. With a command, the
//! process image is replaced and the command inherits the locked
//! descriptor, which keeps the lock held for exactly as long as the
//! command keeps the descriptor open.

use clap::Parser;
use locknloop::error::Result;
use locknloop::exit_codes;
use locknloop::holder;
use locknloop::lock::{self, LockTarget};
use locknloop::timeout::TimeoutSpec;
use nix::unistd::Pid;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

/// Lock a file, then park the lock in a holder process or exec a command
/// under it.
#[derive(Parser, Debug)]
#[command(name = "rangelock", version, about, long_about = None)]
struct Cli {
    /// Regular file to lock.
    lockfile: PathBuf,

    /// Optional wait timeout, then the command to run under the lock.
    ///
    /// A leading non-negative integer is read as the timeout in seconds;
    /// everything after it is the command and its arguments. With no
    /// command the lock is parked in a detached holder process and its
    /// PID printed.
    #[arg(
        value_name = "TIMEOUT|COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    rest: Vec<OsString>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(pid) => {
            println!("{pid}");
            ExitCode::from(exit_codes::SUCCESS as u8)
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Split the trailing arguments into a timeout and the command words.
///
/// The grammar `LOCKFILE [TIMEOUT] [COMMAND...]` is ambiguous in the
/// first trailing word; it is read as the timeout exactly when it parses
/// as a non-negative integer. A purely numeric program name can still be
/// run via an explicit path.
fn split_rest(rest: &[OsString]) -> (TimeoutSpec, &[OsString]) {
    match rest
        .first()
        .and_then(|arg| arg.to_str())
        .and_then(|s| s.parse::<TimeoutSpec>().ok())
    {
        Some(timeout) => (timeout, &rest[1..]),
        None => (TimeoutSpec::IMMEDIATE, rest),
    }
}

fn run(cli: &Cli) -> Result<Pid> {
    let (timeout, command) = split_rest(&cli.rest);

    let target = LockTarget::open(&cli.lockfile)?;
    lock::acquire_exclusive(&target, timeout)?;

    if command.is_empty() {
        // The child inherits the locked descriptor and suspends; the
        // parent reports it and exits.
        holder::spawn_holder()
    } else {
        // Returns only if the exec itself failed.
        match holder::exec_command(target.file(), command)? {}
    }
}
