//! `locknloop`: exclusively lock a backing file, then expose it as a
//! kernel loop device.
//!
//! The advisory lock uses open-file-description semantics, so it stays
//! correct on NFSv4 mounts and follows the descriptor into the loop
//! driver. On success the allocated device path is printed on stdout and
//! the process exits; the kernel keeps the backing descriptor, and with
//! it the lock, open for as long as the device stays attached. There is
//! nothing to daemonize: the loop driver is the long-lived lock holder.

use clap::Parser;
use locknloop::error::Result;
use locknloop::exit_codes;
use locknloop::lock::{self, LockTarget};
use locknloop::loopdev;
use locknloop::timeout::TimeoutSpec;
use std::path::PathBuf;
use std::process::ExitCode;

/// Lock a file and attach it to a free loop device.
#[derive(Parser, Debug)]
#[command(name = "locknloop", version, about, long_about = None)]
struct Cli {
    /// Attach the file without taking the lock first.
    #[arg(short = 'n', long = "no-lock")]
    no_lock: bool,

    /// Seconds to wait for a busy lock before giving up (0 fails
    /// immediately).
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECONDS",
        default_value_t = 0
    )]
    timeout: u32,

    /// Regular file to lock and attach.
    lockfile: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(device) => {
            println!("{}", device.display());
            ExitCode::from(exit_codes::SUCCESS as u8)
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<PathBuf> {
    let target = LockTarget::open(&cli.lockfile)?;

    if !cli.no_lock {
        lock::acquire_exclusive(&target, TimeoutSpec::from_secs(cli.timeout))?;
    }

    // The descriptor being attached is the locked one: lock and binding
    // share a single open file description, so the lock lives exactly as
    // long as the attachment does.
    let binding = loopdev::attach(target.file())?;
    Ok(binding.path().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_short_flags_and_lockfile() {
        let cli = Cli::try_parse_from(["locknloop", "-n", "-t", "5", "disk.img"]).unwrap();
        assert!(cli.no_lock);
        assert_eq!(cli.timeout, 5);
        assert_eq!(cli.lockfile, PathBuf::from("disk.img"));
    }

    #[test]
    fn parses_long_flags() {
        let cli =
            Cli::try_parse_from(["locknloop", "--no-lock", "--timeout", "9", "disk.img"]).unwrap();
        assert!(cli.no_lock);
        assert_eq!(cli.timeout, 9);
    }

    #[test]
    fn timeout_defaults_to_fail_fast() {
        let cli = Cli::try_parse_from(["locknloop", "disk.img"]).unwrap();
        assert!(!cli.no_lock);
        assert_eq!(cli.timeout, 0);
    }

    #[test]
    fn missing_lockfile_is_a_usage_error() {
        let err = Cli::try_parse_from(["locknloop"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
        // clap reports usage errors with the contract's code.
        assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    }

    #[test]
    fn bad_timeout_values_are_rejected() {
        assert!(Cli::try_parse_from(["locknloop", "-t", "abc", "disk.img"]).is_err());
        assert!(Cli::try_parse_from(["locknloop", "-t", "-1", "disk.img"]).is_err());
    }
}
