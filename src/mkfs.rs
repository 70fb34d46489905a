//! Create a fresh filesystem image.

use crate::errors::{FsError, Result};
use crate::fs::FileSystem;
use byte_unit::{Byte, ByteUnit};
use std::path::Path;

/// Blocks needed by the bootstrap entities: `/`, `/.users`, `/.users/root`.
const MIN_BLOCKS: u32 = 3;

/// Format `image_file_path` as a filesystem of `image_size` bytes with
/// `block_size`-byte blocks and return it mounted.
///
/// # Params
/// - `image_file_path`: the image file to create (overwritten if present)
/// - `image_size`: the size of the data region in bytes
/// - `block_size`: the block size of the filesystem
pub fn mkfs<P>(image_file_path: P, image_size: u32, block_size: u32) -> Result<FileSystem>
where
    P: AsRef<Path>,
{
    let space_needed = u64::from(MIN_BLOCKS) * u64::from(block_size.max(1));
    if block_size == 0 || u64::from(image_size) < space_needed {
        return Err(FsError::IllegalArgument(format!(
            "image size must be at least {} for block size {}",
            Byte::from_bytes(u128::from(space_needed)).get_appropriate_unit(true),
            Byte::from_bytes(u128::from(block_size)).get_adjusted_unit(ByteUnit::B),
        )));
    }

    FileSystem::format(image_file_path, image_size, block_size)
}
