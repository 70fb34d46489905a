//! The filesystem core: on-disk structures and the orchestrator.
pub mod bitmap;
pub mod block_store;
pub mod cursor;
pub mod directory;
pub mod filesystem;
pub mod image;
pub mod inode;
pub mod inode_table;
pub mod layout;
pub mod superblock;
pub mod users;

pub use bitmap::Bitmap;
pub use block_store::BlockStore;
pub use cursor::DirHandle;
pub use directory::{Directory, Record};
pub use filesystem::FileSystem;
pub use image::Image;
pub use inode::{Inode, TypeAndPermissions};
pub use inode_table::InodeTable;
pub use layout::FsLayout;
pub use superblock::Superblock;
pub use users::{User, UserRegistry};

/// Identifies a formatted image.
pub const FS_MAGIC: u16 = 0x1234;
/// Encoded superblock length in bytes.
pub const SUPERBLOCK_SIZE: u32 = 26;
/// Size of one inode slot in the inode table.
pub const INODE_SIZE: u32 = 65;
/// Direct block pointers per inode; files are capped at this many blocks.
pub const DIRECT_POINTERS: usize = 12;
/// The root directory's inode index.
pub const ROOT_INODE: u32 = 0;
/// The hidden directory holding one record file per user.
pub const USERS_DIR: &str = "/.users";

pub const DEFAULT_IMAGE_NAME: &str = "filesystem.data";
pub const DEFAULT_IMAGE_SIZE: u32 = 1024 * 1024;
pub const DEFAULT_BLOCK_SIZE: u32 = 1024;
