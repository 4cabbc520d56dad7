//! The block I/O shim (§4.1): presents a device as an array of `BLOCK_SIZE`
//! blocks, with a buffered-read/dirty-write discipline in front of it.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Fixed block size of a yaf image.
pub const BLOCK_SIZE: usize = 4096;

/// A raw block buffer.
pub type RawBlock = [u8; BLOCK_SIZE];

/// Something that can read and write whole, block-aligned chunks of a device.
///
/// Implementations must serialize overlapping writers at block granularity; the
/// in-process [`BlockCache`] built on top of this trait provides that by holding
/// one lock per block.
pub trait BlockDevice: Send + Sync {
	/// Total number of addressable blocks on the device.
	fn block_count(&self) -> u64;

	/// Reads block `bid` into `buf`.
	fn read_block(&self, bid: u64, buf: &mut RawBlock) -> io::Result<()>;

	/// Writes `buf` to block `bid`.
	fn write_block(&self, bid: u64, buf: &RawBlock) -> io::Result<()>;
}

/// A [`BlockDevice`] backed by a regular file or a block device node.
pub struct FileDevice {
	file: Mutex<File>,
	block_count: u64,
}

impl FileDevice {
	/// Opens `path` for reading and writing and computes its block count.
	///
	/// For a block device, the size is queried via `BLKGETSIZE64`; for a regular
	/// file, `metadata().len()` is used directly (§4.6 step 1).
	pub fn open(path: &Path) -> io::Result<Self> {
		let file = std::fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)?;
		let len = crate::util::device_size(&file, path)?;
		Ok(Self {
			file: Mutex::new(file),
			block_count: len / BLOCK_SIZE as u64,
		})
	}

	/// True if `path` names a block device rather than a regular file.
	pub fn is_block_device(path: &Path) -> io::Result<bool> {
		Ok(std::fs::metadata(path)?.file_type().is_block_device())
	}
}

impl BlockDevice for FileDevice {
	fn block_count(&self) -> u64 {
		self.block_count
	}

	fn read_block(&self, bid: u64, buf: &mut RawBlock) -> io::Result<()> {
		let mut file = self.file.lock().unwrap();
		file.seek(SeekFrom::Start(bid * BLOCK_SIZE as u64))?;
		file.read_exact(buf)
	}

	fn write_block(&self, bid: u64, buf: &RawBlock) -> io::Result<()> {
		let mut file = self.file.lock().unwrap();
		file.seek(SeekFrom::Start(bid * BLOCK_SIZE as u64))?;
		file.write_all(buf)
	}
}

/// A cached block, plus whether it has been mutated since it was last written
/// back to the device.
struct Slot {
	data: RawBlock,
	dirty: bool,
}

/// Buffered-read/dirty-write cache over a [`BlockDevice`], keyed by block id.
///
/// This is the "host buffer cache" referenced throughout §4 and §5: consumers
/// call [`BlockCache::read`] to get a [`Buffer`], mutate it in place, call
/// [`Buffer::mark_dirty`], and finally [`Buffer::release`] it. `release` consumes
/// the buffer, so a caller cannot mark it dirty afterwards — the ordering bug
/// flagged in §4.2 ("the legacy ordering of brelse vs mark_buffer_dirty ... flips
/// dirtiness after release") is not representable here: `mark_dirty` takes `&self`
/// and `release` takes `self` by value.
pub struct BlockCache {
	device: Arc<dyn BlockDevice>,
	slots: Mutex<HashMap<u64, Arc<Mutex<Slot>>>>,
}

impl BlockCache {
	pub fn new(device: Arc<dyn BlockDevice>) -> Self {
		Self {
			device,
			slots: Mutex::new(HashMap::new()),
		}
	}

	pub fn device(&self) -> &Arc<dyn BlockDevice> {
		&self.device
	}

	/// Reads block `bid`, from cache if present, from the device otherwise.
	pub fn read(&self, bid: u64) -> io::Result<Buffer> {
		let mut slots = self.slots.lock().unwrap();
		let slot = match slots.get(&bid) {
			Some(slot) => slot.clone(),
			None => {
				let mut data = [0u8; BLOCK_SIZE];
				self.device.read_block(bid, &mut data)?;
				let slot = Arc::new(Mutex::new(Slot { data, dirty: false }));
				slots.insert(bid, slot.clone());
				slot
			}
		};
		Ok(Buffer {
			bid,
			slot,
			device: self.device.clone(),
		})
	}

	/// Returns a zeroed buffer for `bid` without reading the device first.
	///
	/// Used by `mkfs` to write whole metadata blocks (bitmaps) that are about to
	/// be fully overwritten anyway.
	pub fn zeroed(&self, bid: u64) -> Buffer {
		let mut slots = self.slots.lock().unwrap();
		let slot = Arc::new(Mutex::new(Slot {
			data: [0u8; BLOCK_SIZE],
			dirty: false,
		}));
		slots.insert(bid, slot.clone());
		Buffer {
			bid,
			slot,
			device: self.device.clone(),
		}
	}
}

/// A handle on one cached block.
pub struct Buffer {
	bid: u64,
	slot: Arc<Mutex<Slot>>,
	device: Arc<dyn BlockDevice>,
}

impl Buffer {
	pub fn bid(&self) -> u64 {
		self.bid
	}

	/// Runs `f` against the block's current contents.
	pub fn with<R>(&self, f: impl FnOnce(&RawBlock) -> R) -> R {
		let slot = self.slot.lock().unwrap();
		f(&slot.data)
	}

	/// Runs `f` against the block's contents, allowing mutation. Does not mark
	/// the block dirty on its own; call [`Buffer::mark_dirty`] afterwards.
	pub fn with_mut<R>(&self, f: impl FnOnce(&mut RawBlock) -> R) -> R {
		let mut slot = self.slot.lock().unwrap();
		f(&mut slot.data)
	}

	/// Marks the block dirty. Idempotent.
	pub fn mark_dirty(&self) {
		self.slot.lock().unwrap().dirty = true;
	}

	/// Releases the buffer, writing it back to the device first if dirty.
	pub fn release(self) -> io::Result<()> {
		let mut slot = self.slot.lock().unwrap();
		if slot.dirty {
			self.device.write_block(self.bid, &slot.data)?;
			slot.dirty = false;
		}
		Ok(())
	}
}
