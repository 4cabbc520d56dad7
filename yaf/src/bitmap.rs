//! The bitmap allocator (§4.2): one bit per inode slot / data block, bit `i`
//! living in block `base + i / (BLOCK_SIZE*8)` at byte `(i/8) mod BLOCK_SIZE`,
//! bit `i mod 8`.

use std::ops::Range;

use crate::block::{BlockCache, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::superblock::Superblock;

/// Bits addressable by one bitmap block.
pub const BITS_PER_BLOCK: u32 = (BLOCK_SIZE * 8) as u32;

/// Scans `range` in ascending block order, then ascending bit order within
/// each block, for the first clear bit below `limit`, sets it, and returns its
/// global index.
///
/// The whole find-and-set happens while `cache.read` holds that block's lock,
/// so two concurrent callers can never walk away with the same index (§5
/// "atomicity floor").
fn alloc_bit(cache: &BlockCache, range: Range<u64>, limit: u32) -> Result<u32> {
	let bounds = range.clone();
	for (block_idx, bid) in range.enumerate() {
		let buf = cache.read(bid)?;
		let mut found = None;
		buf.with_mut(|data| {
			'scan: for (byte_idx, byte) in data.iter_mut().enumerate() {
				if *byte == 0xff {
					continue;
				}
				for bit in 0..8u32 {
					let global = block_idx as u32 * BITS_PER_BLOCK + byte_idx as u32 * 8 + bit;
					if global >= limit {
						break 'scan;
					}
					if *byte & (1 << bit) == 0 {
						*byte |= 1 << bit;
						found = Some(global);
						break 'scan;
					}
				}
			}
		});
		if let Some(idx) = found {
			buf.mark_dirty();
			buf.release()?;
			return Ok(idx);
		}
		buf.release()?;
	}
	log::warn!("bitmap exhausted over range {bounds:?} (limit {limit})");
	Err(Error::NoSpace)
}

/// Clears bit `idx` in `range`. Panics (a fatal, programmer-invariant
/// violation per §7) if the bit was already clear.
fn free_bit(cache: &BlockCache, range: Range<u64>, idx: u32) -> Result<()> {
	let block_idx = idx / BITS_PER_BLOCK;
	let bid = range.start + block_idx as u64;
	let in_block = idx % BITS_PER_BLOCK;
	let byte_off = (in_block / 8) as usize;
	let bit = (in_block % 8) as u8;

	let buf = cache.read(bid)?;
	let mut was_set = false;
	buf.with_mut(|data| {
		was_set = data[byte_off] & (1 << bit) != 0;
		data[byte_off] &= !(1 << bit);
	});
	assert!(was_set, "double free of bit {idx} in block {bid}");
	buf.mark_dirty();
	buf.release()?;
	Ok(())
}

/// Finds a free inode number and marks it used.
pub fn alloc_inode(cache: &BlockCache, sb: &Superblock) -> Result<u32> {
	alloc_bit(cache, sb.layout.ibp.clone(), sb.max_ino())
}

/// Marks inode `ino` as unused.
pub fn free_inode(cache: &BlockCache, sb: &Superblock, ino: u32) -> Result<()> {
	free_bit(cache, sb.layout.ibp.clone(), ino)
}

/// Finds a free data-block index and marks it used.
pub fn alloc_dblock(cache: &BlockCache, sb: &Superblock) -> Result<u32> {
	alloc_bit(cache, sb.layout.dbp.clone(), sb.nr_d)
}

/// Marks data block `dno` as unused.
pub fn free_dblock(cache: &BlockCache, sb: &Superblock, dno: u32) -> Result<()> {
	free_bit(cache, sb.layout.dbp.clone(), dno)
}
