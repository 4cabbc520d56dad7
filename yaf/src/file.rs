//! File data mapping (§4.5): translates a logical block index within a
//! regular file into a physical block id, allocating on demand.

use crate::bitmap;
use crate::block::{BlockCache, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::inode::Inode;
use crate::superblock::{Superblock, MAX_FILESIZE, RESERVED_DNO, YAF_IBLOCKS};

/// Maps logical block `iblock_idx` of `inode` to a physical block id.
///
/// - Beyond the 8 direct pointers: [`Error::TooLarge`].
/// - A hit (`iblock_idx` already mapped): `Ok(Some(bid))`.
/// - A hole with `create = false`: `Ok(None)` (sparse read reads as zero).
/// - A hole with `create = true`: allocates every slot from the current
///   high-water mark up to and including `iblock_idx`, marks `inode` dirty
///   (size/timestamps are the caller's responsibility), and returns the
///   freshly mapped block. A mid-allocation [`Error::NoSpace`] leaves every
///   block allocated so far in place (§4.5: "prior allocs persist").
pub fn map(cache: &BlockCache, sb: &Superblock, inode: &mut Inode, iblock_idx: u32, create: bool) -> Result<Option<u64>> {
	if iblock_idx >= YAF_IBLOCKS {
		return Err(Error::TooLarge);
	}
	let k = inode.allocated_blocks() as u32;
	if iblock_idx < k {
		return Ok(Some(sb.layout.dno_to_bid(inode.block[iblock_idx as usize])));
	}
	if !create {
		return Ok(None);
	}
	for j in k..=iblock_idx {
		let dno = bitmap::alloc_dblock(cache, sb)?;
		inode.block[j as usize] = dno;
	}
	debug_assert_ne!(inode.block[iblock_idx as usize], RESERVED_DNO);
	Ok(Some(sb.layout.dno_to_bid(inode.block[iblock_idx as usize])))
}

/// Reads up to `buf.len()` bytes starting at byte `offset` within `inode`,
/// zero-filling any unmapped (sparse) region. Returns the number of bytes
/// actually read, truncated at `inode.size`.
pub fn read(cache: &BlockCache, sb: &Superblock, inode: &Inode, offset: u32, buf: &mut [u8]) -> Result<usize> {
	if offset >= inode.size {
		return Ok(0);
	}
	let end = (offset as u64 + buf.len() as u64).min(inode.size as u64) as u32;
	let mut done = 0u32;
	let mut pos = offset;
	// `map` never mutates the layout when `create = false`; the clone keeps
	// the borrow checker happy without pretending this is a real mutation.
	let mut scratch = inode.clone();
	while pos < end {
		let iblock = pos / BLOCK_SIZE as u32;
		let in_block = (pos % BLOCK_SIZE as u32) as usize;
		let chunk = (BLOCK_SIZE - in_block).min((end - pos) as usize);
		match map(cache, sb, &mut scratch, iblock, false)? {
			Some(bid) => {
				let b = cache.read(bid)?;
				b.with(|data| {
					buf[done as usize..done as usize + chunk].copy_from_slice(&data[in_block..in_block + chunk]);
				});
				b.release()?;
			}
			None => {
				buf[done as usize..done as usize + chunk].fill(0);
			}
		}
		done += chunk as u32;
		pos += chunk as u32;
	}
	Ok(done as usize)
}

/// Writes `buf` at byte `offset` within `inode`, allocating blocks as
/// needed. Returns the number of bytes written; grows `inode.size` and
/// touches `mtime`/`ctime` on success, matching the host's generic write
/// path described in §4.5.
pub fn write(cache: &BlockCache, sb: &Superblock, inode: &mut Inode, offset: u32, buf: &[u8]) -> Result<usize> {
	let end = offset as u64 + buf.len() as u64;
	if end > MAX_FILESIZE as u64 {
		return Err(Error::NoSpace);
	}
	let end = end as u32;
	let mut done = 0u32;
	let mut pos = offset;
	while pos < end {
		let iblock = pos / BLOCK_SIZE as u32;
		let in_block = (pos % BLOCK_SIZE as u32) as usize;
		let chunk = (BLOCK_SIZE - in_block).min((end - pos) as usize);
		let bid = map(cache, sb, inode, iblock, true)?.expect("map(create=true) always returns a block");
		let b = cache.read(bid)?;
		b.with_mut(|data| {
			data[in_block..in_block + chunk].copy_from_slice(&buf[done as usize..done as usize + chunk]);
		});
		b.mark_dirty();
		b.release()?;
		done += chunk as u32;
		pos += chunk as u32;
	}
	if end > inode.size {
		inode.size = end;
	}
	let now = crate::util::now();
	inode.mtime = now;
	inode.ctime = now;
	crate::inode::write(cache, sb, inode)?;
	Ok(done as usize)
}
