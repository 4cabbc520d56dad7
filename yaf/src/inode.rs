//! The inode record (§3.2) and its lifecycle (§4.3): on-disk <-> host
//! translation, creation, write-back, and eviction.

use crate::bitmap;
use crate::block::BlockCache;
use crate::error::{Error, Result};
use crate::superblock::{Superblock, RESERVED_DNO, RESERVED_INO, YAF_IBLOCKS};

/// Size in bytes of one on-disk inode record.
pub const INODE_SIZE: usize = 64;

/// `i_mode` type bit: regular file.
pub const S_IFREG: u32 = 0o100000;
/// `i_mode` type bit: directory.
pub const S_IFDIR: u32 = 0o040000;
/// Mask isolating the type bits of `i_mode`.
pub const S_IFMT: u32 = 0o170000;

/// An inode, decoded into host byte order, with `i_block` held for direct
/// indexing (§3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
	pub ino: u32,
	pub mode: u32,
	pub uid: u32,
	pub gid: u32,
	pub nlink: u32,
	pub size: u32,
	pub atime: u32,
	pub mtime: u32,
	pub ctime: u32,
	pub block: [u32; YAF_IBLOCKS as usize],
}

impl Inode {
	pub fn is_dir(&self) -> bool {
		self.mode & S_IFMT == S_IFDIR
	}

	pub fn is_reg(&self) -> bool {
		self.mode & S_IFMT == S_IFREG
	}

	fn decode(ino: u32, raw: &[u8]) -> Self {
		debug_assert_eq!(raw.len(), INODE_SIZE);
		let u32_at = |off: usize| u32::from_le_bytes(raw[off..off + 4].try_into().unwrap());
		let mut block = [RESERVED_DNO; YAF_IBLOCKS as usize];
		for (i, slot) in block.iter_mut().enumerate() {
			*slot = u32_at(32 + i * 4);
		}
		Self {
			ino,
			mode: u32_at(0),
			uid: u32_at(4),
			gid: u32_at(8),
			nlink: u32_at(12),
			size: u32_at(16),
			atime: u32_at(20),
			mtime: u32_at(24),
			ctime: u32_at(28),
			block,
		}
	}

	fn encode(&self, raw: &mut [u8]) {
		debug_assert_eq!(raw.len(), INODE_SIZE);
		raw[0..4].copy_from_slice(&self.mode.to_le_bytes());
		raw[4..8].copy_from_slice(&self.uid.to_le_bytes());
		raw[8..12].copy_from_slice(&self.gid.to_le_bytes());
		raw[12..16].copy_from_slice(&self.nlink.to_le_bytes());
		raw[16..20].copy_from_slice(&self.size.to_le_bytes());
		raw[20..24].copy_from_slice(&self.atime.to_le_bytes());
		raw[24..28].copy_from_slice(&self.mtime.to_le_bytes());
		raw[28..32].copy_from_slice(&self.ctime.to_le_bytes());
		for (i, dno) in self.block.iter().enumerate() {
			raw[32 + i * 4..36 + i * 4].copy_from_slice(&dno.to_le_bytes());
		}
	}

	/// Number of slots at the front of `i_block` that are actually allocated
	/// (§3.5 invariant 2).
	pub fn allocated_blocks(&self) -> usize {
		self.block
			.iter()
			.position(|&dno| dno == RESERVED_DNO)
			.unwrap_or(YAF_IBLOCKS as usize)
	}
}

/// Reads inode `ino` off disk (`iget`, §4.3).
///
/// Range-checks `ino` against the inode table's capacity first; a real VFS
/// would consult its inode cache before this, but that cache is the host
/// collaborator's responsibility (§6.2) and is out of scope here.
pub fn read(cache: &BlockCache, sb: &Superblock, ino: u32) -> Result<Inode> {
	if ino >= sb.max_ino() {
		log::warn!("ino {ino} is out-of-bounds for [0, {})", sb.max_ino());
		return Err(Error::Invalid);
	}
	let bid = sb.layout.ino_to_bid(ino);
	let off = crate::superblock::Layout::ino_to_boff(ino);
	let buf = cache.read(bid)?;
	let inode = buf.with(|data| Inode::decode(ino, &data[off..off + INODE_SIZE]));
	buf.release()?;
	Ok(inode)
}

/// Writes `inode` back to its slot in the inode table (`write_inode`, §4.3).
pub fn write(cache: &BlockCache, sb: &Superblock, inode: &Inode) -> Result<()> {
	let bid = sb.layout.ino_to_bid(inode.ino);
	let off = crate::superblock::Layout::ino_to_boff(inode.ino);
	let buf = cache.read(bid)?;
	buf.with_mut(|data| inode.encode(&mut data[off..off + INODE_SIZE]));
	buf.mark_dirty();
	buf.release()?;
	Ok(())
}

/// Allocates a fresh inode number and populates a brand new inode record
/// (`new_inode`, §4.3). `mode` must already carry the `S_IFDIR`/`S_IFREG` type
/// bit the caller wants.
///
/// A fresh directory's own `nlink` starts at 2 (`.` plus the parent's entry
/// for it, standard Unix convention); a fresh regular file starts at 1.
pub fn alloc(cache: &BlockCache, sb: &Superblock, uid: u32, gid: u32, mode: u32) -> Result<Inode> {
	let ino = bitmap::alloc_inode(cache, sb)?;
	let now = crate::util::now();
	let nlink = if mode & S_IFMT == S_IFDIR { 2 } else { 1 };
	let inode = Inode {
		ino,
		mode,
		uid,
		gid,
		nlink,
		size: 0,
		atime: now,
		mtime: now,
		ctime: now,
		block: [RESERVED_DNO; YAF_IBLOCKS as usize],
	};
	if let Err(e) = write(cache, sb, &inode) {
		bitmap::free_inode(cache, sb, ino)?;
		return Err(e);
	}
	Ok(inode)
}

/// Reclaims an inode once its link count has dropped to zero: frees every
/// allocated data block, then the inode bit itself (`evict_inode`, §4.3).
pub fn evict(cache: &BlockCache, sb: &Superblock, inode: &Inode) -> Result<()> {
	debug_assert_eq!(inode.nlink, 0);
	for &dno in inode.block.iter() {
		if dno != RESERVED_DNO {
			bitmap::free_dblock(cache, sb, dno)?;
		}
	}
	bitmap::free_inode(cache, sb, inode.ino)?;
	Ok(())
}

/// Also exposes `RESERVED_INO` for callers matching against "no entry".
pub const NONE: u32 = RESERVED_INO;
