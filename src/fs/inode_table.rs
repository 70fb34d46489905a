//! The inode table region: fixed-size slots addressed by inode index.

use crate::errors::Result;
use crate::fs::image::Image;
use crate::fs::inode::Inode;
use crate::fs::INODE_SIZE;

/// Reads and writes inode slots at `table_offset`.
///
/// Holds geometry only; the image is passed in by the owning
/// [`FileSystem`](crate::fs::FileSystem).
#[derive(Debug, Clone, Copy)]
pub struct InodeTable {
    inode_size: u32,
    table_offset: u64,
}

impl InodeTable {
    pub fn new(inode_size: u32, table_offset: u64) -> Self {
        InodeTable {
            inode_size,
            table_offset,
        }
    }

    pub fn read(&self, image: &Image, index: u32) -> Result<Inode> {
        let mut data = [0u8; INODE_SIZE as usize];
        image.read_at(&mut data, self.offset(index))?;
        Ok(Inode::decode(&data))
    }

    pub fn save(&self, image: &mut Image, inode: &Inode, index: u32) -> Result<()> {
        image.write_at(&inode.encode(), self.offset(index))
    }

    /// Zero-fill one slot after its inode is released.
    pub fn reset(&self, image: &mut Image, index: u32) -> Result<()> {
        image.write_at(&[0u8; INODE_SIZE as usize], self.offset(index))
    }

    /// Zero-fill the whole table at format time.
    pub fn reserve(&self, image: &mut Image, inode_count: u32) -> Result<()> {
        let zeros = vec![0u8; (u64::from(inode_count) * u64::from(self.inode_size)) as usize];
        image.write_at(&zeros, self.table_offset)
    }

    fn offset(&self, index: u32) -> u64 {
        self.table_offset + u64::from(index) * u64::from(self.inode_size)
    }
}
