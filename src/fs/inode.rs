//! Inodes and the packed type-and-permissions byte.

use crate::errors::{FsError, Result};
use crate::fs::{DIRECT_POINTERS, INODE_SIZE};
use crate::utils::time_util;

/// The unpacked form of the inode's first byte.
///
/// Bit 7 marks a file (directories leave it clear), bit 6 hides the entry
/// from listings, bits 5-3 are the owner's rwx triple and bits 2-0 the world
/// triple. There is no group triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeAndPermissions {
    pub is_file: bool,
    pub is_hidden: bool,
    pub owner_read: bool,
    pub owner_write: bool,
    pub owner_execute: bool,
    pub world_read: bool,
    pub world_write: bool,
    pub world_execute: bool,
}

impl TypeAndPermissions {
    /// Build from a numeric permission value whose decimal digits are read as
    /// octal (`64` means owner `rw-`, world `r--`).
    pub fn new(is_file: bool, is_hidden: bool, numeric_permissions: u32) -> Result<Self> {
        let bits = parse_permission_value(numeric_permissions)?;
        let mut tap = Self::unpack(bits);
        tap.is_file = is_file;
        tap.is_hidden = is_hidden;
        Ok(tap)
    }

    pub fn unpack(value: u8) -> Self {
        TypeAndPermissions {
            is_file: value & 0b1000_0000 != 0,
            is_hidden: value & 0b0100_0000 != 0,
            owner_read: value & 0b0010_0000 != 0,
            owner_write: value & 0b0001_0000 != 0,
            owner_execute: value & 0b0000_1000 != 0,
            world_read: value & 0b0000_0100 != 0,
            world_write: value & 0b0000_0010 != 0,
            world_execute: value & 0b0000_0001 != 0,
        }
    }

    pub fn pack(&self) -> u8 {
        let mut value = 0u8;
        if self.is_file {
            value |= 0b1000_0000;
        }
        if self.is_hidden {
            value |= 0b0100_0000;
        }
        if self.owner_read {
            value |= 0b0010_0000;
        }
        if self.owner_write {
            value |= 0b0001_0000;
        }
        if self.owner_execute {
            value |= 0b0000_1000;
        }
        if self.world_read {
            value |= 0b0000_0100;
        }
        if self.world_write {
            value |= 0b0000_0010;
        }
        if self.world_execute {
            value |= 0b0000_0001;
        }
        value
    }

    /// The 7-character listing form, e.g. `drw-r--` for a directory.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(7);
        out.push(if self.is_file { '-' } else { 'd' });
        for (set, ch) in [
            (self.owner_read, 'r'),
            (self.owner_write, 'w'),
            (self.owner_execute, 'x'),
            (self.world_read, 'r'),
            (self.world_write, 'w'),
            (self.world_execute, 'x'),
        ] {
            out.push(if set { ch } else { '-' });
        }
        out
    }
}

/// Interpret the decimal digits of `value` as octal and reject anything that
/// does not fit the six permission bits.
fn parse_permission_value(value: u32) -> Result<u8> {
    let bits = u8::from_str_radix(&value.to_string(), 8)
        .map_err(|_| FsError::IllegalArgument(format!("permission value {value}")))?;
    if bits > 0o77 {
        return Err(FsError::IllegalArgument(format!(
            "permission value {value}"
        )));
    }
    Ok(bits)
}

/// A fixed-size inode slot.
///
/// `file_size` counts occupied direct blocks, not bytes; entries of `blocks`
/// at indices `file_size..` are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inode {
    pub type_and_permissions: u8,
    pub user_id: u16,
    pub file_size: u32,
    pub creation_time: u32,
    pub modification_time: u32,
    pub blocks: [u32; DIRECT_POINTERS],
}

impl Inode {
    /// A fresh inode owning `data_blocks`, stamped with the current time.
    pub fn new(
        is_file: bool,
        is_hidden: bool,
        numeric_permissions: u32,
        user_id: u16,
        data_blocks: &[u32],
    ) -> Result<Self> {
        if data_blocks.len() > DIRECT_POINTERS {
            return Err(FsError::FileTooLarge(format!(
                "{} blocks requested, {DIRECT_POINTERS} direct pointers available",
                data_blocks.len()
            )));
        }

        let mut blocks = [0u32; DIRECT_POINTERS];
        blocks[..data_blocks.len()].copy_from_slice(data_blocks);
        let now = time_util::now();

        Ok(Inode {
            type_and_permissions: TypeAndPermissions::new(is_file, is_hidden, numeric_permissions)?
                .pack(),
            user_id,
            file_size: data_blocks.len() as u32,
            creation_time: now,
            modification_time: now,
            blocks,
        })
    }

    pub fn encode(&self) -> [u8; INODE_SIZE as usize] {
        let mut data = [0u8; INODE_SIZE as usize];
        data[0] = self.type_and_permissions;
        data[1..3].copy_from_slice(&self.user_id.to_be_bytes());
        data[3..7].copy_from_slice(&self.file_size.to_be_bytes());
        data[7..11].copy_from_slice(&self.creation_time.to_be_bytes());
        data[11..15].copy_from_slice(&self.modification_time.to_be_bytes());
        for (i, block) in self.blocks.iter().enumerate() {
            let offset = 15 + i * 4;
            data[offset..offset + 4].copy_from_slice(&block.to_be_bytes());
        }
        data
    }

    pub fn decode(data: &[u8; INODE_SIZE as usize]) -> Self {
        let mut blocks = [0u32; DIRECT_POINTERS];
        for (i, block) in blocks.iter_mut().enumerate() {
            let offset = 15 + i * 4;
            *block = u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap());
        }

        Inode {
            type_and_permissions: data[0],
            user_id: u16::from_be_bytes(data[1..3].try_into().unwrap()),
            file_size: u32::from_be_bytes(data[3..7].try_into().unwrap()),
            creation_time: u32::from_be_bytes(data[7..11].try_into().unwrap()),
            modification_time: u32::from_be_bytes(data[11..15].try_into().unwrap()),
            blocks,
        }
    }
}

/// Metadata predicates and permission checks.
impl Inode {
    pub fn is_file(&self) -> bool {
        TypeAndPermissions::unpack(self.type_and_permissions).is_file
    }

    pub fn is_hidden(&self) -> bool {
        TypeAndPermissions::unpack(self.type_and_permissions).is_hidden
    }

    /// The occupied prefix of the direct block list.
    pub fn occupied_blocks(&self) -> &[u32] {
        &self.blocks[..self.file_size as usize]
    }

    pub fn has_read_permission(&self, user_id: u16) -> bool {
        if user_id == 0 {
            return true;
        }
        let tap = TypeAndPermissions::unpack(self.type_and_permissions);
        tap.world_read || (user_id == self.user_id && tap.owner_read)
    }

    pub fn has_write_permission(&self, user_id: u16) -> bool {
        if user_id == 0 {
            return true;
        }
        let tap = TypeAndPermissions::unpack(self.type_and_permissions);
        tap.world_write || (user_id == self.user_id && tap.owner_write)
    }

    /// Replace the six permission bits, keeping the file and hidden flags.
    pub fn change_permissions(&mut self, numeric_permissions: u32) -> Result<()> {
        let bits = parse_permission_value(numeric_permissions)?;
        self.type_and_permissions = (self.type_and_permissions & 0b1100_0000) | bits;
        Ok(())
    }

    pub fn permission_string(&self) -> String {
        TypeAndPermissions::unpack(self.type_and_permissions).render()
    }

    pub fn update_modification_time(&mut self) {
        self.modification_time = time_util::now();
    }
}
