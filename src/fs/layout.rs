//! Byte offsets of the image regions, derived from the superblock.

use crate::fs::bitmap::Bitmap;
use crate::fs::superblock::Superblock;
use crate::fs::SUPERBLOCK_SIZE;

/// Where each region of the image begins.
///
/// The image is laid out as superblock, block bitmap, inode bitmap, inode
/// table, data blocks; every offset below is an absolute byte position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsLayout {
    pub block_bitmap_offset: u64,
    pub inode_bitmap_offset: u64,
    pub inode_table_offset: u64,
    pub data_blocks_offset: u64,
}

impl FsLayout {
    pub fn from_superblock(superblock: &Superblock) -> Self {
        let block_bitmap_offset = u64::from(SUPERBLOCK_SIZE);
        let inode_bitmap_offset = block_bitmap_offset + Bitmap::byte_size(superblock.block_count);
        let inode_table_offset = inode_bitmap_offset + Bitmap::byte_size(superblock.inode_count);
        let data_blocks_offset = inode_table_offset
            + u64::from(superblock.inode_count) * u64::from(superblock.inode_size);

        FsLayout {
            block_bitmap_offset,
            inode_bitmap_offset,
            inode_table_offset,
            data_blocks_offset,
        }
    }

    /// Total image file size for this geometry.
    pub fn total_size(&self, superblock: &Superblock) -> u64 {
        self.data_blocks_offset
            + u64::from(superblock.block_count) * u64::from(superblock.block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry_offsets() {
        // 1 MiB image, 1 KiB blocks: 1024 blocks and 1024 inodes.
        let superblock = Superblock::new(1024 * 1024, 1024);
        let layout = FsLayout::from_superblock(&superblock);

        assert_eq!(layout.block_bitmap_offset, 26);
        assert_eq!(layout.inode_bitmap_offset, 26 + 128);
        assert_eq!(layout.inode_table_offset, 26 + 128 + 128);
        assert_eq!(layout.data_blocks_offset, 26 + 128 + 128 + 1024 * 65);
        assert_eq!(
            layout.total_size(&superblock),
            26 + 128 + 128 + 1024 * 65 + 1024 * 1024
        );
    }

    #[test]
    fn test_bitmap_sizes_round_up() {
        let superblock = Superblock::new(10 * 512, 512);
        // 10 blocks -> 2 bitmap bytes each
        let layout = FsLayout::from_superblock(&superblock);
        assert_eq!(layout.inode_bitmap_offset - layout.block_bitmap_offset, 2);
        assert_eq!(layout.inode_table_offset - layout.inode_bitmap_offset, 2);
    }
}
