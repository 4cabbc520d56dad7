//! Boundary scenarios against a freshly formatted image (§8).
//!
//! Every test formats its own 16 MiB scratch file: `bnr = 4096`,
//! `nr_ibp = nr_dbp = 1`, `nr_i = 64`, `nr_d = 4029`.

use std::sync::Arc;

use tempfile::NamedTempFile;
use yaf::block::{BlockDevice, BLOCK_SIZE, FileDevice};
use yaf::error::Error;
use yaf::fs::Filesystem;
use yaf::superblock::{MAX_DENTRYS, MAX_FILESIZE, ROOT_INO};

const IMAGE_BLOCKS: u64 = 4096;

fn formatted_fs() -> (Filesystem, NamedTempFile) {
	let tmp = NamedTempFile::new().expect("create scratch file");
	tmp.as_file()
		.set_len(IMAGE_BLOCKS * BLOCK_SIZE as u64)
		.expect("size scratch file");

	let device = FileDevice::open(tmp.path()).expect("open scratch file");
	let device: Arc<dyn BlockDevice> = Arc::new(device);
	yaf::mkfs::format(device.clone()).expect("format image");

	let fs = Filesystem::mount(device).expect("mount freshly formatted image");
	(fs, tmp)
}

#[test]
fn mkfs_produces_a_valid_empty_root() {
	let (fs, _tmp) = formatted_fs();
	let root = fs.stat(ROOT_INO).unwrap();
	assert!(root.is_dir());
	assert_eq!(root.size, 0);
	assert_eq!(root.ino, ROOT_INO);
}

#[test]
fn mkdir_then_touch_then_write_then_unlink_then_rmdir() {
	let (fs, _tmp) = formatted_fs();

	// 1. mkdir /a
	let a = fs.mkdir(ROOT_INO, b"a", 0o755).unwrap();
	assert_eq!(a.ino, 2);
	let root = fs.stat(ROOT_INO).unwrap();
	assert_eq!(root.size, 32);

	// 2. touch /a/f
	let f = fs.create_file(a.ino, b"f", 0o644).unwrap();
	assert_eq!(f.ino, 3);
	let a_after = fs.stat(a.ino).unwrap();
	assert_eq!(a_after.size, 32);

	// 3. write 8193 bytes to /a/f
	let payload = vec![0x42u8; 8193];
	let written = fs.write(f.ino, 0, &payload).unwrap();
	assert_eq!(written, 8193);
	let f_after = fs.stat(f.ino).unwrap();
	assert_eq!(f_after.size, 8193);
	assert_eq!(f_after.allocated_blocks(), 3);
	for slot in &f_after.block[3..8] {
		assert_eq!(*slot, 0);
	}

	// 4. write 32769 bytes to /a/f -> ENOSPC (one byte past MAX_FILESIZE)
	let oversized = vec![0u8; (MAX_FILESIZE + 1) as usize];
	let err = fs.write(f.ino, 0, &oversized).unwrap_err();
	assert!(matches!(err, Error::NoSpace));

	// 5. unlink /a/f
	fs.unlink(a.ino, b"f").unwrap();
	assert_eq!(fs.stat(f.ino).unwrap().nlink, 0);
	assert!(matches!(fs.lookup(a.ino, b"f"), Err(Error::NotFound)));

	// 6. rmdir /a (now empty)
	fs.rmdir(ROOT_INO, b"a").unwrap();
	assert!(matches!(fs.lookup(ROOT_INO, b"a"), Err(Error::NotFound)));
}

#[test]
fn directory_full_after_max_dentrys() {
	let (fs, _tmp) = formatted_fs();
	for i in 0..MAX_DENTRYS {
		let name = format!("f{i}");
		fs.create_file(ROOT_INO, name.as_bytes(), 0o644).unwrap();
	}
	let err = fs.create_file(ROOT_INO, b"one-too-many", 0o644).unwrap_err();
	assert!(matches!(err, Error::NoSpace));
}

#[test]
fn name_length_boundary() {
	let (fs, _tmp) = formatted_fs();
	let max_name = vec![b'x'; fs.name_max()];
	assert!(fs.create_file(ROOT_INO, &max_name, 0o644).is_ok());

	let too_long = vec![b'y'; fs.name_max() + 1];
	let err = fs.create_file(ROOT_INO, &too_long, 0o644).unwrap_err();
	assert!(matches!(err, Error::NameTooLong));
}

#[test]
fn rmdir_refuses_non_empty_directory() {
	let (fs, _tmp) = formatted_fs();
	let a = fs.mkdir(ROOT_INO, b"a", 0o755).unwrap();
	fs.create_file(a.ino, b"f", 0o644).unwrap();
	let err = fs.rmdir(ROOT_INO, b"a").unwrap_err();
	assert!(matches!(err, Error::NotEmpty));
}

#[test]
fn subdirectory_nlink_starts_at_two_and_parent_bumps_once_per_child() {
	let (fs, _tmp) = formatted_fs();

	let a = fs.mkdir(ROOT_INO, b"a", 0o755).unwrap();
	assert_eq!(a.nlink, 2, "a fresh directory counts '.' plus its parent's entry");

	// A regular-file sibling must never touch the parent's nlink.
	let root_before = fs.stat(ROOT_INO).unwrap().nlink;
	fs.create_file(ROOT_INO, b"f", 0o644).unwrap();
	assert_eq!(fs.stat(ROOT_INO).unwrap().nlink, root_before);

	// A subdirectory sibling bumps the parent's nlink by exactly one.
	fs.mkdir(ROOT_INO, b"b", 0o755).unwrap();
	assert_eq!(fs.stat(ROOT_INO).unwrap().nlink, root_before + 1);

	// rmdir releases the parent's back-link for that child.
	fs.rmdir(ROOT_INO, b"b").unwrap();
	assert_eq!(fs.stat(ROOT_INO).unwrap().nlink, root_before);
}

#[test]
fn readdir_synthesizes_dot_and_dotdot_first() {
	let (fs, _tmp) = formatted_fs();
	let a = fs.mkdir(ROOT_INO, b"a", 0o755).unwrap();
	fs.create_file(a.ino, b"f", 0o644).unwrap();

	let (first, cursor) = fs.readdir_next(a.ino, ROOT_INO, 0).unwrap();
	assert_eq!(first.unwrap().name, b".");
	let (second, cursor) = fs.readdir_next(a.ino, ROOT_INO, cursor).unwrap();
	assert_eq!(second.unwrap().name, b"..");
	let (third, cursor) = fs.readdir_next(a.ino, ROOT_INO, cursor).unwrap();
	let third = third.unwrap();
	assert_eq!(third.name, b"f");

	let (done, _) = fs.readdir_next(a.ino, ROOT_INO, cursor).unwrap();
	assert!(done.is_none());
}

#[test]
fn write_then_read_back_matches() {
	let (fs, _tmp) = formatted_fs();
	let f = fs.create_file(ROOT_INO, b"f", 0o644).unwrap();
	fs.write(f.ino, 0, b"hello").unwrap();

	let mut buf = [0xffu8; 16];
	let n = fs.read(f.ino, 0, &mut buf).unwrap();
	assert_eq!(n, 5);
	assert_eq!(&buf[..5], b"hello");
}
