//! A miniature Unix-style filesystem stored inside a single image file.
//!
//! The image holds a superblock, two allocation bitmaps, an inode table and a
//! data-block region. On top of that layout the crate exposes
//! POSIX-flavoured operations (create/read/edit/append/delete, directories,
//! move/copy, permissions and ownership) and a small multi-user model with
//! SHA-512-hashed passwords. See [`fs::FileSystem`] for the operation
//! surface and [`cli_interface::Shell`] for the interactive front end.

pub mod cli_interface;
pub mod errors;
pub mod fs;
pub mod mkfs;
pub mod utils;

pub use errors::{FsError, Result};
pub use fs::{FileSystem, DEFAULT_BLOCK_SIZE, DEFAULT_IMAGE_NAME, DEFAULT_IMAGE_SIZE};
