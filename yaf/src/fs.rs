//! The top-level entry points a host would bind into its operation tables
//! (§6.2): mount, and the directory/file operations layered on top of
//! [`crate::dir`], [`crate::file`] and [`crate::inode`].

use std::sync::Arc;

use crate::block::{BlockCache, BlockDevice};
use crate::dentry::NAME_MAX;
use crate::dir::DirEntry;
use crate::error::{Error, Result};
use crate::inode::{Inode, S_IFDIR, S_IFREG};
use crate::superblock::{Superblock, ROOT_INO, SB_BID};
use crate::{dir, file, inode};

/// A mounted yaf image: the block cache plus the superblock decoded from it.
///
/// This is the `fill_super` result (§4.6): everything downstream addresses
/// inodes and data blocks through `cache`/`sb`, never the device directly.
pub struct Filesystem {
	cache: BlockCache,
	sb: Superblock,
}

impl Filesystem {
	/// `fill_super(device)` (§4.6): reads and validates the superblock, then
	/// confirms the root inode is reachable.
	pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Self> {
		let cache = BlockCache::new(device);
		let buf = cache.read(SB_BID)?;
		let sb = Superblock::decode(&buf)?;
		buf.release()?;

		let fs = Self { cache, sb };
		fs.stat(ROOT_INO)?;
		Ok(fs)
	}

	pub fn root_ino(&self) -> u32 {
		ROOT_INO
	}

	/// Fetches the inode record for `ino` (`iget`, §4.3).
	pub fn stat(&self, ino: u32) -> Result<Inode> {
		inode::read(&self.cache, &self.sb, ino)
	}

	/// `lookup(dir, name)` (§4.4.1).
	pub fn lookup(&self, dir_ino: u32, name: &[u8]) -> Result<u32> {
		let dir = self.stat(dir_ino)?;
		if !dir.is_dir() {
			return Err(Error::NotDir);
		}
		dir::lookup(&self.cache, &self.sb, &dir, name)
	}

	fn create(&self, dir_ino: u32, name: &[u8], mode: u32) -> Result<Inode> {
		let mut dir = self.stat(dir_ino)?;
		if !dir.is_dir() {
			return Err(Error::NotDir);
		}
		let (uid, gid) = unsafe { (libc::geteuid(), libc::getegid()) };
		dir::create(&self.cache, &self.sb, &mut dir, uid, gid, name, mode)
	}

	/// Creates a regular file named `name` in `dir_ino` (§4.4.2, `S_IFREG`).
	pub fn create_file(&self, dir_ino: u32, name: &[u8], perm: u32) -> Result<Inode> {
		self.create(dir_ino, name, S_IFREG | (perm & 0o7777))
	}

	/// Creates a subdirectory named `name` in `dir_ino` (§4.4.2, `S_IFDIR`).
	pub fn mkdir(&self, dir_ino: u32, name: &[u8], perm: u32) -> Result<Inode> {
		self.create(dir_ino, name, S_IFDIR | (perm & 0o7777))
	}

	/// `unlink(dir, dentry)` (§4.4.3) for a regular file.
	pub fn unlink(&self, dir_ino: u32, name: &[u8]) -> Result<()> {
		let mut dir = self.stat(dir_ino)?;
		dir::unlink(&self.cache, &self.sb, &mut dir, name)
	}

	/// `rmdir(dir, dentry)` (§4.4.3).
	pub fn rmdir(&self, dir_ino: u32, name: &[u8]) -> Result<()> {
		let mut dir = self.stat(dir_ino)?;
		dir::rmdir(&self.cache, &self.sb, &mut dir, name)
	}

	/// `readdir(dir, cursor)` (§4.4.4).
	pub fn readdir_next(&self, dir_ino: u32, parent_ino: u32, cursor: u32) -> Result<(Option<DirEntry>, u32)> {
		let dir = self.stat(dir_ino)?;
		if !dir.is_dir() {
			return Err(Error::NotDir);
		}
		dir::readdir_next(&self.cache, &self.sb, &dir, parent_ino, cursor)
	}

	/// Reads up to `buf.len()` bytes of a regular file at `offset`.
	pub fn read(&self, ino: u32, offset: u32, buf: &mut [u8]) -> Result<usize> {
		let inode = self.stat(ino)?;
		if !inode.is_reg() {
			return Err(Error::Invalid);
		}
		file::read(&self.cache, &self.sb, &inode, offset, buf)
	}

	/// Writes `buf` to a regular file at `offset`, growing it as needed.
	pub fn write(&self, ino: u32, offset: u32, buf: &[u8]) -> Result<usize> {
		let mut inode = self.stat(ino)?;
		if !inode.is_reg() {
			return Err(Error::Invalid);
		}
		file::write(&self.cache, &self.sb, &mut inode, offset, buf)
	}

	pub fn name_max(&self) -> usize {
		NAME_MAX
	}
}
