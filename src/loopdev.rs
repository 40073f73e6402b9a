//! Loop device binding: attach a locked backing file to a free
//! `/dev/loopN` node.
//!
//! Allocation goes through `/dev/loop-control` with `LOOP_CTL_GET_FREE`,
//! which hands out a free minor atomically. Scanning `/dev` for an unused
//! node would race with every other allocator on the machine, so the
//! binder never does that.
//!
//! Once `LOOP_SET_FD` succeeds the loop driver holds its own reference to
//! the backing open file description, lock included. The binding, and the
//! lock with it, therefore outlives this process; detaching is somebody
//! else's `losetup -d`.

use crate::error::{LockError, Result};
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const LOOP_CONTROL: &str = "/dev/loop-control";

mod ioctl {
    use nix::{ioctl_none_bad, ioctl_write_int_bad};

    // Loop device ioctl request numbers from the Linux ABI
    // (<linux/loop.h>); libc 0.2 does not export them.
    const LOOP_SET_FD: libc::c_ulong = 0x4C00;
    const LOOP_SET_DIRECT_IO: libc::c_ulong = 0x4C08;
    const LOOP_CTL_GET_FREE: libc::c_ulong = 0x4C82;

    ioctl_none_bad!(loop_ctl_get_free, LOOP_CTL_GET_FREE);
    ioctl_write_int_bad!(loop_set_fd, LOOP_SET_FD);
    ioctl_write_int_bad!(loop_set_direct_io, LOOP_SET_DIRECT_IO);
}

/// A loop device with a backing file attached.
#[derive(Debug)]
pub struct LoopBinding {
    number: u32,
    path: PathBuf,
    device: File,
}

impl LoopBinding {
    /// Minor number allocated by the kernel.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Device node path, e.g. `/dev/loop3`. This is the one line of
    /// machine-consumable output the device variant prints.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The opened device node.
    pub fn device(&self) -> &File {
        &self.device
    }
}

fn device_path(number: u32) -> PathBuf {
    PathBuf::from(format!("/dev/loop{number}"))
}

/// Allocate a free loop device and attach `backing` to it.
///
/// Direct I/O is requested best-effort at the end: a refusal (backing
/// filesystem or alignment constraints) degrades to buffered I/O with a
/// warning, it does not fail the binding. Everything before that is
/// fatal, because a half-made binding would leave the lock held with no
/// device to show for it.
pub fn attach(backing: &File) -> Result<LoopBinding> {
    let control = File::options()
        .read(true)
        .write(true)
        .open(LOOP_CONTROL)
        .map_err(|err| LockError::syscall(format!("Unable to open: {LOOP_CONTROL}"), err))?;

    let number = unsafe { ioctl::loop_ctl_get_free(control.as_raw_fd()) }
        .map_err(|err| LockError::syscall("ioctl-LOOP_CTL_GET_FREE", err))?;
    let path = device_path(number as u32);

    let device = File::options()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|err| {
            LockError::syscall(format!("Unable to open loop {}", path.display()), err)
        })?;

    unsafe { ioctl::loop_set_fd(device.as_raw_fd(), backing.as_raw_fd()) }
        .map_err(|err| LockError::syscall("Unable to set up loop device", err))?;

    if unsafe { ioctl::loop_set_direct_io(device.as_raw_fd(), 1) }.is_err() {
        eprintln!("Opened the loop device without direct I/O");
    }

    Ok(LoopBinding {
        number: number as u32,
        path,
        device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn device_path_uses_the_allocated_minor() {
        assert_eq!(device_path(0), PathBuf::from("/dev/loop0"));
        assert_eq!(device_path(7), PathBuf::from("/dev/loop7"));
        assert_eq!(device_path(121), PathBuf::from("/dev/loop121"));
    }

    #[test]
    #[ignore = "requires root and the loop driver"]
    fn attach_binds_the_backing_file() {
        let tmp = NamedTempFile::new().unwrap();
        tmp.as_file().set_len(1 << 20).unwrap();

        let backing = File::options()
            .read(true)
            .write(true)
            .open(tmp.path())
            .unwrap();
        let binding = attach(&backing).unwrap();

        assert!(binding.path().exists());
        assert_eq!(binding.path(), device_path(binding.number()));
    }
}
