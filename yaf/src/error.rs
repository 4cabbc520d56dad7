//! The error taxonomy shared by every `yaf` entry point.

use std::io;

/// Errors raised by the filesystem core.
///
/// Each variant maps directly onto a row of the error taxonomy: allocator
/// exhaustion, device I/O failure, a file index beyond the direct-block limit,
/// an over-long name, a non-empty directory passed to `rmdir`, a lookup miss,
/// `readdir` called on a non-directory, and a corrupt or out-of-range superblock
/// or inode number.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("no space left on device")]
	NoSpace,
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
	#[error("file offset exceeds the maximum file size")]
	TooLarge,
	#[error("name exceeds {} bytes", crate::dentry::NAME_MAX)]
	NameTooLong,
	#[error("directory is not empty")]
	NotEmpty,
	#[error("no such entry")]
	NotFound,
	#[error("not a directory")]
	NotDir,
	#[error("invalid filesystem image")]
	Invalid,
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
