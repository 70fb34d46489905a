//! The image file, consumed as a random-access byte store.

use crate::errors::{FsError, Result};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

/// A memory-mapped image file.
///
/// The mounted [`FileSystem`](crate::fs::FileSystem) owns the only `Image`
/// handle for its lifetime; components receive it by reference when they need
/// to read or persist their state.
pub struct Image {
    mmap: MmapMut,
}

impl Image {
    /// Create (or overwrite) an image file of exactly `len` bytes, zero-filled.
    pub fn create<P>(path: P, len: u64) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len(len)?;

        // Safety: the file was just opened read-write and sized; the mapping
        // stays private to this process for the lifetime of the handle.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Image { mmap })
    }

    /// Open an existing image file for reading and writing.
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        // Safety: as in `create`.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Image { mmap })
    }

    /// Read exactly `buf.len()` bytes starting at `offset`.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let range = self.checked_range(offset, buf.len())?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    /// Write all of `data` starting at `offset`.
    pub fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        let range = self.checked_range(offset, data.len())?;
        self.mmap[range].copy_from_slice(data);
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// The full image contents; used by idempotency checks.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Flush outstanding writes to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    fn checked_range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let end = offset
            .checked_add(len as u64)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| {
                FsError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("access of {len} bytes at offset {offset} exceeds image size"),
                ))
            })?;
        Ok(offset as usize..end as usize)
    }
}
