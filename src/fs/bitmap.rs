//! Allocation bitmaps for blocks and inodes.

use crate::errors::{FsError, Result};
use crate::fs::image::Image;
use bitvec::prelude::*;

/// A fixed-size bit array persisted at a known image offset.
///
/// Bit `i` lives in byte `i / 8` at position `7 - (i % 8)`, so the raw byte
/// slice matches the on-disk layout directly (`Msb0` ordering).
#[derive(Debug, Clone)]
pub struct Bitmap {
    bits: BitVec<u8, Msb0>,
    bit_count: u32,
    offset: u64,
}

impl Bitmap {
    /// A zero-filled bitmap of `bit_count` bits stored at `offset`.
    pub fn new(bit_count: u32, offset: u64) -> Self {
        Bitmap {
            bits: BitVec::from_vec(vec![0u8; Self::byte_size(bit_count) as usize]),
            bit_count,
            offset,
        }
    }

    /// Load a bitmap from the image.
    pub fn read_from(image: &Image, offset: u64, bit_count: u32) -> Result<Self> {
        let mut data = vec![0u8; Self::byte_size(bit_count) as usize];
        image.read_at(&mut data, offset)?;
        Ok(Bitmap {
            bits: BitVec::from_vec(data),
            bit_count,
            offset,
        })
    }

    /// Bytes needed to hold `bit_count` bits, rounded up.
    pub const fn byte_size(bit_count: u32) -> u64 {
        bit_count.div_ceil(8) as u64
    }

    /// The size of this bitmap's on-disk region in bytes.
    pub fn size(&self) -> u64 {
        Self::byte_size(self.bit_count)
    }

    pub fn get(&self, index: u32) -> Result<bool> {
        self.check_bounds(index)?;
        Ok(self.bits[index as usize])
    }

    pub fn set(&mut self, index: u32, value: bool) -> Result<()> {
        self.check_bounds(index)?;
        self.bits.set(index as usize, value);
        Ok(())
    }

    /// Find the first 0-bit, set it, and return its index.
    pub fn take_free_bit(&mut self) -> Result<u32> {
        let index = self.bits[..self.bit_count as usize]
            .first_zero()
            .ok_or(FsError::NoFreeBit)?;
        self.bits.set(index, true);
        Ok(index as u32)
    }

    /// Number of unset bits; must equal the superblock's free counter.
    pub fn count_free(&self) -> u32 {
        self.bits[..self.bit_count as usize].count_zeros() as u32
    }

    /// Persist the backing bytes at the configured offset.
    pub fn save(&self, image: &mut Image) -> Result<()> {
        image.write_at(self.bits.as_raw_slice(), self.offset)
    }

    fn check_bounds(&self, index: u32) -> Result<()> {
        if index >= self.bit_count {
            return Err(FsError::IndexOutOfBounds {
                index,
                size: self.bit_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() -> Result<()> {
        let mut bitmap = Bitmap::new(10, 0);
        assert!(!bitmap.get(3)?);
        bitmap.set(3, true)?;
        assert!(bitmap.get(3)?);
        bitmap.set(3, false)?;
        assert!(!bitmap.get(3)?);
        Ok(())
    }

    #[test]
    fn test_out_of_bounds() {
        let mut bitmap = Bitmap::new(10, 0);
        assert!(matches!(
            bitmap.get(10),
            Err(FsError::IndexOutOfBounds { index: 10, size: 10 })
        ));
        assert!(bitmap.set(10, true).is_err());
    }

    #[test]
    fn test_take_free_bit_scans_from_zero() -> Result<()> {
        let mut bitmap = Bitmap::new(10, 0);
        assert_eq!(bitmap.take_free_bit()?, 0);
        assert_eq!(bitmap.take_free_bit()?, 1);
        bitmap.set(0, false)?;
        assert_eq!(bitmap.take_free_bit()?, 0);
        Ok(())
    }

    #[test]
    fn test_take_free_bit_exhaustion() -> Result<()> {
        let mut bitmap = Bitmap::new(3, 0);
        for _ in 0..3 {
            bitmap.take_free_bit()?;
        }
        assert!(matches!(bitmap.take_free_bit(), Err(FsError::NoFreeBit)));
        Ok(())
    }

    #[test]
    fn test_bit_order_is_msb_first() -> Result<()> {
        let mut bitmap = Bitmap::new(16, 0);
        bitmap.set(0, true)?;
        bitmap.set(9, true)?;
        assert_eq!(bitmap.bits.as_raw_slice(), &[0b1000_0000, 0b0100_0000]);
        Ok(())
    }

    #[test]
    fn test_count_free() -> Result<()> {
        let mut bitmap = Bitmap::new(12, 0);
        assert_eq!(bitmap.count_free(), 12);
        bitmap.take_free_bit()?;
        bitmap.take_free_bit()?;
        assert_eq!(bitmap.count_free(), 10);
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut image = Image::create(dir.path().join("test.img"), 64)?;
        let mut bitmap = Bitmap::new(20, 8);
        bitmap.set(0, true)?;
        bitmap.set(13, true)?;
        bitmap.save(&mut image)?;

        let reloaded = Bitmap::read_from(&image, 8, 20)?;
        assert!(reloaded.get(0)?);
        assert!(reloaded.get(13)?);
        assert_eq!(reloaded.count_free(), 18);
        Ok(())
    }
}
