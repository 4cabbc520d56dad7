//! Small helpers shared by the allocator, mkfs and the codecs.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// ioctl command: get the size of a block device, in bytes.
///
/// Grounded in the teacher's `utils::disk::get_disk_size` ioctl macros.
const BLKGETSIZE64: libc::c_ulong = {
	const fn ioc(dir: libc::c_ulong, ty: libc::c_ulong, nr: libc::c_ulong, size: libc::c_ulong) -> libc::c_ulong {
		(dir << 30) | (ty << 8) | nr | (size << 16)
	}
	ioc(2, 0x12, 114, std::mem::size_of::<u64>() as libc::c_ulong)
};

/// Returns the size in bytes of the device or file at `path`.
///
/// For a block device this queries `BLKGETSIZE64`; for a regular file it reads
/// the file's length directly (§4.6 step 1).
pub fn device_size(file: &File, path: &Path) -> io::Result<u64> {
	let metadata = std::fs::metadata(path)?;
	if metadata.file_type().is_block_device() {
		let mut size: u64 = 0;
		let ret = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64, &mut size) };
		if ret < 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(size)
	} else {
		Ok(metadata.len())
	}
}

/// Ceil-divides `a` by `b`.
pub fn ceil_division(a: u32, b: u32) -> u32 {
	(a + b - 1) / b
}

/// Current time as a Unix timestamp truncated to `u32`, matching the on-disk
/// inode's 32-bit time fields.
pub fn now() -> u32 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the Unix epoch")
		.as_secs() as u32
}
