//! The on-disk superblock (§3.1) and the section bounds derived from it.

use crate::block::{Buffer, BLOCK_SIZE};
use crate::error::{Error, Result};

/// Block id of the superblock itself.
pub const SB_BID: u64 = 0;

/// The 4-byte magic string, NUL-included, tiled across the superblock's filler.
pub const MAGIC: [u8; 4] = *b"yaf\0";

/// Number of 64-byte inode records per 4096-byte block.
pub const INODES_PER_BLOCK: u32 = (BLOCK_SIZE / crate::inode::INODE_SIZE) as u32;

/// Number of 32-byte directory entries per 4096-byte block.
pub const DENTRYS_PER_BLOCK: u32 = (BLOCK_SIZE / crate::dentry::DENTRY_SIZE) as u32;

/// Number of direct block pointers in an inode; also the max size of a
/// directory's dentry-block array.
pub const YAF_IBLOCKS: u32 = 8;

/// Upper bound on the number of dentry slots (live or tombstoned) in one
/// directory: `YAF_IBLOCKS` dentry blocks of `DENTRYS_PER_BLOCK` entries each.
pub const MAX_DENTRYS: u32 = YAF_IBLOCKS * DENTRYS_PER_BLOCK;

/// Maximum regular file size: `YAF_IBLOCKS` direct blocks of `BLOCK_SIZE` bytes.
pub const MAX_FILESIZE: u32 = YAF_IBLOCKS * BLOCK_SIZE as u32;

/// Reserved inode number meaning "none" / "unallocated".
pub const RESERVED_INO: u32 = 0;
/// The filesystem's root directory inode.
pub const ROOT_INO: u32 = 1;
/// Reserved data-block number meaning "no block allocated here".
pub const RESERVED_DNO: u32 = 0;

/// Half-open block-id ranges for each of the five partition sections (§2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
	pub ibp: std::ops::Range<u64>,
	pub dbp: std::ops::Range<u64>,
	pub i: std::ops::Range<u64>,
	pub d: std::ops::Range<u64>,
}

impl Layout {
	fn compute(nr_ibp: u32, nr_dbp: u32, nr_i: u32, nr_d: u32) -> Self {
		let ibp_start = 1u64;
		let ibp_end = ibp_start + nr_ibp as u64;
		let dbp_end = ibp_end + nr_dbp as u64;
		let i_end = dbp_end + nr_i as u64;
		let d_end = i_end + nr_d as u64;
		Self {
			ibp: ibp_start..ibp_end,
			dbp: ibp_end..dbp_end,
			i: dbp_end..i_end,
			d: i_end..d_end,
		}
	}

	/// Converts a 0-based data-block index into its absolute block id.
	pub fn dno_to_bid(&self, dno: u32) -> u64 {
		self.d.start + dno as u64
	}

	/// Converts an inode number into the block id of its containing inode-table
	/// block.
	pub fn ino_to_bid(&self, ino: u32) -> u64 {
		self.i.start + (ino / INODES_PER_BLOCK) as u64
	}

	/// Offset, in bytes, of inode `ino`'s record within its containing block.
	pub fn ino_to_boff(ino: u32) -> usize {
		(ino % INODES_PER_BLOCK) as usize * crate::inode::INODE_SIZE
	}
}

/// The in-memory superblock: on-disk geometry plus derived section bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
	pub nr_ibp: u32,
	pub nr_dbp: u32,
	pub nr_i: u32,
	pub nr_d: u32,
	pub layout: Layout,
}

impl Superblock {
	pub fn new(nr_ibp: u32, nr_dbp: u32, nr_i: u32, nr_d: u32) -> Self {
		Self {
			nr_ibp,
			nr_dbp,
			nr_i,
			nr_d,
			layout: Layout::compute(nr_ibp, nr_dbp, nr_i, nr_d),
		}
	}

	/// Total inode slots addressable by the inode table, used by `iget`'s
	/// range check (§4.3).
	pub fn max_ino(&self) -> u32 {
		self.nr_i * INODES_PER_BLOCK
	}

	/// Parses the superblock out of a freshly read block-0 buffer (§4.6
	/// `fill_super`).
	pub fn decode(buf: &Buffer) -> Result<Self> {
		buf.with(|data| {
			for chunk in data[16..].chunks(MAGIC.len()) {
				if chunk != MAGIC {
					log::warn!("superblock magic mismatch");
					return Err(Error::Invalid);
				}
			}
			let nr_ibp = u32::from_le_bytes(data[0..4].try_into().unwrap());
			let nr_dbp = u32::from_le_bytes(data[4..8].try_into().unwrap());
			let nr_i = u32::from_le_bytes(data[8..12].try_into().unwrap());
			let nr_d = u32::from_le_bytes(data[12..16].try_into().unwrap());
			Ok(Superblock::new(nr_ibp, nr_dbp, nr_i, nr_d))
		})
	}

	/// Encodes the superblock's geometry and magic filler into `buf` (§4.6
	/// mkfs step 3).
	pub fn encode(&self, buf: &Buffer) {
		buf.with_mut(|data| {
			data[0..4].copy_from_slice(&self.nr_ibp.to_le_bytes());
			data[4..8].copy_from_slice(&self.nr_dbp.to_le_bytes());
			data[8..12].copy_from_slice(&self.nr_i.to_le_bytes());
			data[12..16].copy_from_slice(&self.nr_d.to_le_bytes());
			for chunk in data[16..].chunks_mut(MAGIC.len()) {
				chunk.copy_from_slice(&MAGIC);
			}
		});
		buf.mark_dirty();
	}
}
