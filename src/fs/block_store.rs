//! Content I/O across an inode's direct blocks.

use crate::errors::{FsError, Result};
use crate::fs::image::Image;
use crate::fs::inode::Inode;

/// Reads and writes the data-block region.
///
/// Like [`InodeTable`](crate::fs::InodeTable) this carries geometry only and
/// receives the image per call.
#[derive(Debug, Clone, Copy)]
pub struct BlockStore {
    block_size: u32,
    blocks_offset: u64,
}

impl BlockStore {
    pub fn new(block_size: u32, blocks_offset: u64) -> Self {
        BlockStore {
            block_size,
            blocks_offset,
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Absolute offset of a data block.
    pub fn block_offset(&self, index: u32) -> u64 {
        self.blocks_offset + u64::from(index) * u64::from(self.block_size)
    }

    /// Read all occupied blocks back to back.
    pub fn read_raw(&self, image: &Image, inode: &Inode) -> Result<Vec<u8>> {
        let block_size = self.block_size as usize;
        let mut data = vec![0u8; inode.file_size as usize * block_size];
        for (i, block) in inode.occupied_blocks().iter().enumerate() {
            image.read_at(
                &mut data[i * block_size..(i + 1) * block_size],
                self.block_offset(*block),
            )?;
        }
        Ok(data)
    }

    /// Read a file's content as text.
    ///
    /// All blocks before the last are returned in full; the last block is cut
    /// at its first zero byte. A last block with no zero byte means the
    /// terminator was lost (corrupt or over-full), which is an error.
    pub fn read_blocks(&self, image: &Image, inode: &Inode, name: &str) -> Result<String> {
        if inode.file_size == 0 {
            return Ok(String::new());
        }

        let mut data = self.read_raw(image, inode)?;
        let last_block_start = (inode.file_size as usize - 1) * self.block_size as usize;
        let terminator = data[last_block_start..]
            .iter()
            .position(|byte| *byte == 0)
            .ok_or_else(|| FsError::MissingNulTerminator(name.to_string()))?;
        data.truncate(last_block_start + terminator);

        String::from_utf8(data)
            .map_err(|_| FsError::CorruptImage(format!("file content of {name} is not valid text")))
    }

    /// Write `content` across the occupied blocks, zero-padding the tail of
    /// every block.
    pub fn write_blocks(&self, image: &mut Image, inode: &Inode, content: &[u8]) -> Result<()> {
        let block_size = self.block_size as usize;
        for (i, block) in inode.occupied_blocks().iter().enumerate() {
            let start = (i * block_size).min(content.len());
            let end = ((i + 1) * block_size).min(content.len());

            let mut data = vec![0u8; block_size];
            data[..end - start].copy_from_slice(&content[start..end]);
            image.write_at(&data, self.block_offset(*block))?;
        }
        Ok(())
    }

    /// Zero-fill every occupied block.
    pub fn reset_blocks(&self, image: &mut Image, inode: &Inode) -> Result<()> {
        let zeros = vec![0u8; self.block_size as usize];
        for block in inode.occupied_blocks() {
            image.write_at(&zeros, self.block_offset(*block))?;
        }
        Ok(())
    }

    /// Zero-fill the whole data region at format time.
    pub fn reserve(&self, image: &mut Image, block_count: u32) -> Result<()> {
        let zeros = vec![0u8; (u64::from(block_count) * u64::from(self.block_size)) as usize];
        image.write_at(&zeros, self.blocks_offset)
    }
}
