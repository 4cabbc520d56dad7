//! The mkfs procedure (§4.6): computes geometry from device size, writes the
//! superblock, zeroes both bitmaps, and plants the root inode.

use std::path::Path;
use std::sync::Arc;

use crate::bitmap::BITS_PER_BLOCK;
use crate::block::{BlockCache, BlockDevice, FileDevice};
use crate::error::Result;
use crate::inode::{Inode, S_IFDIR};
use crate::superblock::{Superblock, INODES_PER_BLOCK, RESERVED_DNO, RESERVED_INO, ROOT_INO, YAF_IBLOCKS};
use crate::util::ceil_division;

/// Formats `path` (a regular file or block device) as a fresh yaf image.
pub fn mkfs(path: &Path) -> Result<()> {
	let device = FileDevice::open(path)?;
	let device: Arc<dyn BlockDevice> = Arc::new(device);
	format(device)
}

/// Runs the mkfs procedure against an already-open device; split out from
/// [`mkfs`] so tests can format an in-memory or tempfile-backed device
/// without going through a filesystem path.
pub fn format(device: Arc<dyn BlockDevice>) -> Result<()> {
	let bnr = device.block_count();
	let bnr = ((bnr / INODES_PER_BLOCK as u64) * INODES_PER_BLOCK as u64) as u32;

	let nr_ibp = ceil_division(bnr, BITS_PER_BLOCK);
	let nr_dbp = nr_ibp;
	let nr_i = ceil_division(bnr, INODES_PER_BLOCK);
	let nr_d = bnr - 1 - nr_i - nr_ibp - nr_dbp;

	log::info!(
		"formatting {bnr} blocks: {nr_ibp} inode-bitmap, {nr_dbp} data-bitmap, {nr_i} inode-table, {nr_d} data"
	);

	let cache = BlockCache::new(device);
	let sb = Superblock::new(nr_ibp, nr_dbp, nr_i, nr_d);

	let sb_buf = cache.zeroed(crate::superblock::SB_BID);
	sb.encode(&sb_buf);
	sb_buf.release()?;

	// RESERVED_INO (bit 0) is never handed out by alloc_inode; it is marked
	// used here, once, rather than relying on an allocator scan to skip it.
	// ROOT_INO (bit 1) is reserved the same way (§4.6 step 4).
	for bid in sb.layout.ibp.clone() {
		let buf = cache.zeroed(bid);
		if bid == sb.layout.ibp.start {
			buf.with_mut(|data| data[0] |= (1u8 << RESERVED_INO) | (1u8 << ROOT_INO));
		}
		buf.mark_dirty();
		buf.release()?;
	}
	for bid in sb.layout.dbp.clone() {
		let buf = cache.zeroed(bid);
		buf.mark_dirty();
		buf.release()?;
	}

	let root = Inode {
		ino: ROOT_INO,
		mode: S_IFDIR | 0o777,
		uid: unsafe { libc::geteuid() },
		gid: unsafe { libc::getegid() },
		nlink: 1,
		size: 0,
		atime: 0,
		mtime: 0,
		ctime: 0,
		block: [RESERVED_DNO; YAF_IBLOCKS as usize],
	};
	crate::inode::write(&cache, &sb, &root)?;

	log::info!("root inode written at ino {ROOT_INO}");
	Ok(())
}
