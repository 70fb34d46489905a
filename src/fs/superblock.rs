//! The image header: geometry and free-space counters.

use crate::errors::{FsError, Result};
use crate::fs::image::Image;
use crate::fs::{FS_MAGIC, INODE_SIZE, SUPERBLOCK_SIZE};

/// The superblock, persisted big-endian at offset 0 of the image.
///
/// `free_block_count` and `free_inode_count` mirror the zero-bit counts of the
/// two bitmaps and move in lockstep with every allocation and release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u16,
    pub block_count: u32,
    pub inode_count: u32,
    pub free_block_count: u32,
    pub free_inode_count: u32,
    pub block_size: u32,
    pub inode_size: u32,
}

impl Superblock {
    /// Geometry for a fresh image: one inode per block, everything free.
    pub fn new(image_size: u32, block_size: u32) -> Self {
        let block_count = image_size / block_size;

        Superblock {
            magic: FS_MAGIC,
            block_count,
            inode_count: block_count,
            free_block_count: block_count,
            free_inode_count: block_count,
            block_size,
            inode_size: INODE_SIZE,
        }
    }

    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE as usize] {
        let mut data = [0u8; SUPERBLOCK_SIZE as usize];
        data[0..2].copy_from_slice(&self.magic.to_be_bytes());
        data[2..6].copy_from_slice(&self.block_count.to_be_bytes());
        data[6..10].copy_from_slice(&self.inode_count.to_be_bytes());
        data[10..14].copy_from_slice(&self.free_block_count.to_be_bytes());
        data[14..18].copy_from_slice(&self.free_inode_count.to_be_bytes());
        data[18..22].copy_from_slice(&self.block_size.to_be_bytes());
        data[22..26].copy_from_slice(&self.inode_size.to_be_bytes());
        data
    }

    pub fn decode(data: &[u8; SUPERBLOCK_SIZE as usize]) -> Self {
        Superblock {
            magic: u16::from_be_bytes(data[0..2].try_into().unwrap()),
            block_count: u32::from_be_bytes(data[2..6].try_into().unwrap()),
            inode_count: u32::from_be_bytes(data[6..10].try_into().unwrap()),
            free_block_count: u32::from_be_bytes(data[10..14].try_into().unwrap()),
            free_inode_count: u32::from_be_bytes(data[14..18].try_into().unwrap()),
            block_size: u32::from_be_bytes(data[18..22].try_into().unwrap()),
            inode_size: u32::from_be_bytes(data[22..26].try_into().unwrap()),
        }
    }

    /// Persist to offset 0.
    pub fn save(&self, image: &mut Image) -> Result<()> {
        image.write_at(&self.encode(), 0)
    }

    /// Read the superblock of a mounted image, validating the magic number.
    pub fn read_from(image: &Image) -> Result<Self> {
        let mut data = [0u8; SUPERBLOCK_SIZE as usize];
        image.read_at(&mut data, 0)?;
        let superblock = Superblock::decode(&data);

        if superblock.magic != FS_MAGIC {
            return Err(FsError::CorruptImage(format!(
                "bad magic number {:#06x}, expected {:#06x}",
                superblock.magic, FS_MAGIC
            )));
        }
        if superblock.block_size == 0 || superblock.inode_size != INODE_SIZE {
            return Err(FsError::CorruptImage(format!(
                "implausible geometry: block size {}, inode size {}",
                superblock.block_size, superblock.inode_size
            )));
        }

        Ok(superblock)
    }
}
