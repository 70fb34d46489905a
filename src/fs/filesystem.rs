//! The filesystem orchestrator: format, mount, and every user-facing
//! operation.

use crate::errors::{FsError, Result};
use crate::fs::bitmap::Bitmap;
use crate::fs::block_store::BlockStore;
use crate::fs::cursor::DirHandle;
use crate::fs::directory::Directory;
use crate::fs::image::Image;
use crate::fs::inode::Inode;
use crate::fs::inode_table::InodeTable;
use crate::fs::layout::FsLayout;
use crate::fs::superblock::Superblock;
use crate::fs::users::{User, UserRegistry, ROOT_USER_ID};
use crate::fs::{DIRECT_POINTERS, ROOT_INODE, USERS_DIR};
use crate::utils::path::{compose_path, rewrite_path, split_path};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;

/// Numeric permission value assigned at creation: owner `rw-`, world `r--`.
const CREATE_PERMISSIONS: u32 = 64;

/// A mounted filesystem.
///
/// Owns the image exclusively; the superblock, both bitmaps and the working
/// directory are cached in memory and written through at the persistence
/// points of each operation.
pub struct FileSystem {
    image: Image,
    superblock: Superblock,
    block_bitmap: Bitmap,
    inode_bitmap: Bitmap,
    inode_table: InodeTable,
    block_store: BlockStore,
    cwd: DirHandle,
    users: UserRegistry,
}

/// Construction: format a fresh image or mount an existing one.
impl FileSystem {
    /// Write a fresh layout into `image_path` and mount it.
    ///
    /// Creates `/`, the hidden `/.users` directory and the root user
    /// (password "root"), then logs in as root.
    pub fn format<P>(image_path: P, image_size: u32, block_size: u32) -> Result<FileSystem>
    where
        P: AsRef<Path>,
    {
        if block_size == 0 || image_size / block_size.max(1) < 3 {
            return Err(FsError::IllegalArgument(format!(
                "image of {image_size} bytes with {block_size}-byte blocks is too small"
            )));
        }

        let superblock = Superblock::new(image_size, block_size);
        let layout = FsLayout::from_superblock(&superblock);
        let mut image = Image::create(image_path, layout.total_size(&superblock))?;

        let block_bitmap = Bitmap::new(superblock.block_count, layout.block_bitmap_offset);
        let inode_bitmap = Bitmap::new(superblock.inode_count, layout.inode_bitmap_offset);
        let inode_table = InodeTable::new(superblock.inode_size, layout.inode_table_offset);
        let block_store = BlockStore::new(superblock.block_size, layout.data_blocks_offset);

        superblock.save(&mut image)?;
        block_bitmap.save(&mut image)?;
        inode_bitmap.save(&mut image)?;
        inode_table.reserve(&mut image, superblock.inode_count)?;
        block_store.reserve(&mut image, superblock.block_count)?;

        let mut fs = FileSystem {
            image,
            superblock,
            block_bitmap,
            inode_bitmap,
            inode_table,
            block_store,
            cwd: DirHandle::bootstrap(),
            users: UserRegistry::new(),
        };

        fs.create_entity("/", false, "", false)?;
        fs.create_entity(USERS_DIR, false, "", true)?;
        fs.add_user("root", "root")?;
        fs.change_user("root", "root")?;

        info!(
            "formatted image: {} blocks of {} bytes",
            fs.superblock.block_count, fs.superblock.block_size
        );
        Ok(fs)
    }

    /// Mount an existing image: read the superblock and bitmaps, open the
    /// root directory, load the user registry and log in as root.
    pub fn open<P>(image_path: P) -> Result<FileSystem>
    where
        P: AsRef<Path>,
    {
        let image = Image::open(image_path)?;
        let superblock = Superblock::read_from(&image)?;
        let layout = FsLayout::from_superblock(&superblock);

        let block_bitmap =
            Bitmap::read_from(&image, layout.block_bitmap_offset, superblock.block_count)?;
        let inode_bitmap =
            Bitmap::read_from(&image, layout.inode_bitmap_offset, superblock.inode_count)?;
        let inode_table = InodeTable::new(superblock.inode_size, layout.inode_table_offset);
        let block_store = BlockStore::new(superblock.block_size, layout.data_blocks_offset);

        let mut fs = FileSystem {
            image,
            superblock,
            block_bitmap,
            inode_bitmap,
            inode_table,
            block_store,
            cwd: DirHandle::bootstrap(),
            users: UserRegistry::new(),
        };

        fs.cwd = fs.open_root()?;
        fs.load_users()?;

        info!(
            "mounted image: {} blocks of {} bytes, {} free",
            fs.superblock.block_count, fs.superblock.block_size, fs.superblock.free_block_count
        );
        Ok(fs)
    }

    fn load_users(&mut self) -> Result<()> {
        let users_dir = self.resolve_dir(USERS_DIR)?;
        let mut known = BTreeMap::new();

        for name in users_dir.dir.names() {
            if name == "." || name == ".." {
                continue;
            }
            let line = self.read_file(&format!("{USERS_DIR}/{name}"))?;
            let user = User::parse_line(&line)?;
            known.insert(user.user_id, user.username);
        }
        self.users.load(known);

        let root_line = self.read_file(&format!("{USERS_DIR}/root"))?;
        self.users.set_current(User::parse_line(&root_line)?);
        Ok(())
    }
}

/// Inspection.
impl FileSystem {
    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn block_bitmap(&self) -> &Bitmap {
        &self.block_bitmap
    }

    pub fn inode_bitmap(&self) -> &Bitmap {
        &self.inode_bitmap
    }

    pub fn current_path(&self) -> &str {
        self.cwd.path()
    }

    pub fn current_user_name(&self) -> &str {
        self.users
            .current()
            .map(|user| user.username.as_str())
            .unwrap_or("")
    }

    /// Read an inode slot directly; mainly for consistency checks.
    pub fn read_inode(&self, index: u32) -> Result<Inode> {
        self.inode_table.read(&self.image, index)
    }

    /// The raw image contents.
    pub fn image_bytes(&self) -> &[u8] {
        self.image.as_bytes()
    }

    /// Flush outstanding image writes to the host file.
    pub fn flush(&self) -> Result<()> {
        self.image.flush()
    }
}

/// Path resolution.
impl FileSystem {
    /// Walk `path` and return the opened directory without touching the
    /// working directory.
    ///
    /// A leading empty component marks an absolute path; every traversed
    /// directory must grant read permission to the current user.
    fn resolve_dir(&self, path: &str) -> Result<DirHandle> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return self.open_root();
        }

        let mut handle = self.cwd.clone();
        for (position, component) in trimmed.split('/').enumerate() {
            if component.is_empty() {
                if position != 0 {
                    return Err(FsError::IllegalArgument(format!("incorrect path - {path}")));
                }
                handle = self.open_root()?;
                continue;
            }
            handle = self.open_child(&handle, component)?;
        }
        Ok(handle)
    }

    /// Split `path` and open its directory part; an empty prefix resolves to
    /// the working directory.
    fn resolve_parent(&self, path: &str) -> Result<(DirHandle, String)> {
        let (prefix, name) = split_path(path);
        let parent = if prefix.is_empty() {
            self.cwd.clone()
        } else {
            self.resolve_dir(prefix)?
        };
        debug!("resolved {path:?} to {:?} + {name:?}", parent.path);
        Ok((parent, name.to_string()))
    }

    fn open_root(&self) -> Result<DirHandle> {
        let inode = self.inode_table.read(&self.image, ROOT_INODE)?;
        self.check_read(&inode, "/")?;
        let dir = self.load_directory(&inode)?;
        Ok(DirHandle::new(dir, inode, ROOT_INODE, "/".to_string()))
    }

    fn open_child(&self, handle: &DirHandle, component: &str) -> Result<DirHandle> {
        let inode_index = handle.dir.inode_of(component)?;
        let inode = self.inode_table.read(&self.image, inode_index)?;
        self.check_read(&inode, component)?;
        if inode.is_file() {
            return Err(FsError::NotADirectory(component.to_string()));
        }
        let dir = self.load_directory(&inode)?;
        let path = rewrite_path(&handle.path, component);
        Ok(DirHandle::new(dir, inode, inode_index, path))
    }

    fn load_directory(&self, inode: &Inode) -> Result<Directory> {
        Ok(Directory::decode(
            &self.block_store.read_raw(&self.image, inode)?,
        ))
    }

    /// Re-read the working directory when a mutation went through a handle
    /// naming the same inode.
    fn sync_cwd_if(&mut self, inode_index: u32) -> Result<()> {
        if self.cwd.inode_index == inode_index {
            let inode = self.inode_table.read(&self.image, inode_index)?;
            self.cwd.dir = self.load_directory(&inode)?;
            self.cwd.inode = inode;
        }
        Ok(())
    }

    fn check_read(&self, inode: &Inode, what: &str) -> Result<()> {
        match self.users.current() {
            Some(user) if !inode.has_read_permission(user.user_id) => {
                Err(FsError::PermissionDenied(what.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn check_write(&self, inode: &Inode, what: &str) -> Result<()> {
        match self.users.current() {
            Some(user) if !inode.has_write_permission(user.user_id) => {
                Err(FsError::PermissionDenied(what.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// File and directory creation.
impl FileSystem {
    pub fn create_file(&mut self, path: &str, content: &str) -> Result<()> {
        self.create_entity(path, true, content, false).map(|_| ())
    }

    pub fn create_empty_file(&mut self, path: &str) -> Result<()> {
        self.create_entity(path, true, "", false).map(|_| ())
    }

    pub fn create_directory(&mut self, path: &str) -> Result<()> {
        self.create_entity(path, false, "", false).map(|_| ())
    }

    fn create_entity(
        &mut self,
        path: &str,
        is_file: bool,
        content: &str,
        hidden: bool,
    ) -> Result<u32> {
        if content.bytes().any(|byte| byte == 0) {
            return Err(FsError::IllegalArgument(
                "content contains a zero byte".to_string(),
            ));
        }

        let is_root = path == "/";
        if is_root && self.users.current().is_some() {
            // "/" is only ever created while bootstrapping a fresh image
            return Err(FsError::AlreadyExists("/".to_string()));
        }
        let (mut parent, name) = if is_root {
            (DirHandle::bootstrap(), String::new())
        } else {
            self.resolve_parent(path)?
        };

        if !is_root {
            if name.is_empty() || name.len() > 255 {
                return Err(FsError::IllegalArgument(format!("entry name {name:?}")));
            }
            if parent.dir.contains(&name) {
                return Err(FsError::AlreadyExists(name));
            }
            self.check_write(&parent.inode, &name)?;
        }

        let block_count = self.needed_blocks(content.len());
        if block_count as usize > DIRECT_POINTERS {
            return Err(FsError::FileTooLarge(path.to_string()));
        }

        let blocks = self.allocate_blocks(block_count)?;
        let inode_index = match self.inode_bitmap.take_free_bit() {
            Ok(index) => index,
            Err(err) => {
                self.release_blocks(&blocks)?;
                return Err(err);
            }
        };
        self.superblock.free_inode_count -= 1;

        self.superblock.save(&mut self.image)?;
        self.block_bitmap.save(&mut self.image)?;
        self.inode_bitmap.save(&mut self.image)?;

        let user_id = self.users.current().map_or(0, |user| user.user_id);
        let inode = Inode::new(is_file, hidden, CREATE_PERMISSIONS, user_id, &blocks)?;
        self.inode_table.save(&mut self.image, &inode, inode_index)?;

        if is_file {
            if !content.is_empty() {
                self.block_store
                    .write_blocks(&mut self.image, &inode, content.as_bytes())?;
            }
        } else {
            let parent_index = if is_root { ROOT_INODE } else { parent.inode_index };
            let dir = Directory::new(inode_index, parent_index);
            self.block_store
                .write_blocks(&mut self.image, &inode, &dir.encode())?;
            if is_root {
                self.cwd = DirHandle::new(dir, inode.clone(), inode_index, "/".to_string());
            }
        }

        if !is_root {
            parent.dir.add(inode_index, &name)?;
            self.save_directory(&mut parent)?;
            self.sync_cwd_if(parent.inode_index)?;
        }

        info!(
            "created {} {path} (inode {inode_index}, {block_count} blocks)",
            if is_file { "file" } else { "directory" },
        );
        Ok(inode_index)
    }
}

/// File content operations.
impl FileSystem {
    pub fn read_file(&self, path: &str) -> Result<String> {
        let (parent, name) = self.resolve_parent(path)?;
        let inode_index = parent.dir.inode_of(&name)?;
        let inode = self.inode_table.read(&self.image, inode_index)?;
        self.check_read(&inode, &name)?;
        if !inode.is_file() {
            return Err(FsError::NotAFile(name));
        }
        self.block_store.read_blocks(&self.image, &inode, &name)
    }

    /// Replace a file's content, growing or shrinking its block set.
    pub fn edit_file(&mut self, path: &str, content: &str) -> Result<()> {
        if content.bytes().any(|byte| byte == 0) {
            return Err(FsError::IllegalArgument(
                "content contains a zero byte".to_string(),
            ));
        }

        let (parent, name) = self.resolve_parent(path)?;
        let inode_index = parent.dir.inode_of(&name)?;
        let mut inode = self.inode_table.read(&self.image, inode_index)?;
        self.check_write(&inode, &name)?;
        if !inode.is_file() {
            return Err(FsError::NotAFile(name));
        }

        let new_count = self.needed_blocks(content.len());
        if new_count as usize > DIRECT_POINTERS {
            return Err(FsError::FileTooLarge(path.to_string()));
        }

        // wipe the current payload before the block set changes
        self.block_store.reset_blocks(&mut self.image, &inode)?;

        let old_count = inode.file_size;
        if new_count > old_count {
            let extra = self.allocate_blocks(new_count - old_count)?;
            inode.blocks[old_count as usize..new_count as usize].copy_from_slice(&extra);
        } else {
            for i in new_count..old_count {
                let block = inode.blocks[i as usize];
                self.block_bitmap.set(block, false)?;
                self.superblock.free_block_count += 1;
                inode.blocks[i as usize] = 0;
            }
        }
        inode.file_size = new_count;

        self.block_store
            .write_blocks(&mut self.image, &inode, content.as_bytes())?;
        inode.update_modification_time();
        self.inode_table.save(&mut self.image, &inode, inode_index)?;
        self.superblock.save(&mut self.image)?;
        self.block_bitmap.save(&mut self.image)?;

        info!("edited {path} ({old_count} -> {new_count} blocks)");
        Ok(())
    }

    pub fn append_to_file(&mut self, path: &str, content: &str) -> Result<()> {
        let existing = self.read_file(path)?;
        self.edit_file(path, &format!("{existing}{content}"))
    }
}

/// Deletion, move and copy.
impl FileSystem {
    /// Delete a file or a directory tree.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let (mut parent, name) = self.resolve_parent(path)?;
        self.delete_entry(&name, &mut parent)?;
        self.sync_cwd_if(parent.inode_index)?;
        info!("deleted {path}");
        Ok(())
    }

    fn delete_entry(&mut self, name: &str, parent: &mut DirHandle) -> Result<()> {
        if name == "." || name == ".." {
            return Err(FsError::IllegalArgument(name.to_string()));
        }

        let inode_index = parent.dir.inode_of(name)?;
        let mut inode = self.inode_table.read(&self.image, inode_index)?;
        self.check_write(&inode, name)?;

        if !inode.is_file() {
            let dir = self.load_directory(&inode)?;
            let mut child = DirHandle::new(
                dir,
                inode.clone(),
                inode_index,
                compose_path(&parent.path, name),
            );
            for child_name in child.dir.names().to_vec() {
                if child_name == "." || child_name == ".." {
                    continue;
                }
                self.delete_entry(&child_name, &mut child)?;
            }
            // recursion re-saves the directory; pick up its final block set
            inode = self.inode_table.read(&self.image, inode_index)?;
        }

        parent.dir.delete(name);

        for block in inode.occupied_blocks() {
            self.block_bitmap.set(*block, false)?;
            self.superblock.free_block_count += 1;
        }
        self.inode_bitmap.set(inode_index, false)?;
        self.superblock.free_inode_count += 1;

        self.block_store.reset_blocks(&mut self.image, &inode)?;
        self.inode_table.reset(&mut self.image, inode_index)?;
        self.save_directory(parent)?;

        self.block_bitmap.save(&mut self.image)?;
        self.inode_bitmap.save(&mut self.image)?;
        self.superblock.save(&mut self.image)
    }

    /// Re-link an entry under a new parent or name. The inode is unchanged.
    pub fn move_entry(&mut self, from: &str, to: &str) -> Result<()> {
        let (mut src_parent, src_name) = self.resolve_parent(from)?;
        if src_name.is_empty() || src_name == "." || src_name == ".." {
            return Err(FsError::IllegalArgument(from.to_string()));
        }
        let inode_index = src_parent.dir.inode_of(&src_name)?;
        self.check_write(&src_parent.inode, &src_name)?;

        let (mut dst_parent, dst_name) = self.resolve_parent(to)?;
        if dst_name.is_empty() {
            return Err(FsError::IllegalArgument(to.to_string()));
        }
        if dst_parent.dir.contains(&dst_name) {
            return Err(FsError::AlreadyExists(dst_name));
        }
        self.check_write(&dst_parent.inode, &dst_name)?;
        if dst_parent.inode_index == inode_index {
            return Err(FsError::IllegalArgument(format!(
                "cannot move {from} into itself"
            )));
        }

        if src_parent.inode_index == dst_parent.inode_index {
            src_parent.dir.delete(&src_name);
            src_parent.dir.add(inode_index, &dst_name)?;
            self.save_directory(&mut src_parent)?;
        } else {
            src_parent.dir.delete(&src_name);
            self.save_directory(&mut src_parent)?;
            dst_parent.dir.add(inode_index, &dst_name)?;
            self.save_directory(&mut dst_parent)?;
            self.sync_cwd_if(dst_parent.inode_index)?;
        }
        self.sync_cwd_if(src_parent.inode_index)?;

        info!("moved {from} to {to}");
        Ok(())
    }

    /// Copy a file, or a directory tree entry by entry.
    pub fn copy_entry(&mut self, from: &str, to: &str) -> Result<()> {
        let (src_parent, src_name) = self.resolve_parent(from)?;
        if src_name.is_empty() {
            return Err(FsError::IllegalArgument(from.to_string()));
        }
        let inode_index = src_parent.dir.inode_of(&src_name)?;
        let inode = self.inode_table.read(&self.image, inode_index)?;
        self.check_read(&inode, &src_name)?;

        if inode.is_file() {
            let content = self.block_store.read_blocks(&self.image, &inode, &src_name)?;
            self.create_entity(to, true, &content, false)?;
        } else {
            if to.starts_with(&compose_path(from, "")) {
                return Err(FsError::IllegalArgument(format!(
                    "cannot copy {from} into itself"
                )));
            }
            self.create_entity(to, false, "", false)?;
            let children = self.load_directory(&inode)?.names().to_vec();
            for child in children {
                if child == "." || child == ".." {
                    continue;
                }
                self.copy_entry(&compose_path(from, &child), &compose_path(to, &child))?;
            }
        }
        Ok(())
    }
}

/// Working directory and listings.
impl FileSystem {
    pub fn change_directory(&mut self, path: &str) -> Result<()> {
        self.cwd = self.resolve_dir(path)?;
        debug!("cwd is now {}", self.cwd.path);
        Ok(())
    }

    /// Entry names of the working directory, hidden entries filtered.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for name in self.cwd.dir.names() {
            let inode = self.inode_table.read(&self.image, self.cwd.dir.inode_of(name)?)?;
            if inode.is_hidden() {
                continue;
            }
            names.push(name.clone());
        }
        Ok(names)
    }

    /// Long listing: permissions, owner, size in bytes, modification time,
    /// name — tab separated.
    pub fn list_long(&self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for name in self.cwd.dir.names() {
            let inode = self.inode_table.read(&self.image, self.cwd.dir.inode_of(name)?)?;
            if inode.is_hidden() {
                continue;
            }
            let owner = self
                .users
                .username(inode.user_id)
                .map(str::to_string)
                .unwrap_or_else(|| inode.user_id.to_string());
            lines.push(format!(
                "{}\t{}\t{}\t{}\t{}",
                inode.permission_string(),
                owner,
                inode.file_size * self.superblock.block_size,
                crate::utils::time_util::format_short(inode.modification_time),
                name,
            ));
        }
        Ok(lines)
    }
}

/// Permissions and ownership.
impl FileSystem {
    /// Replace the six permission bits; the numeric value's decimal digits
    /// are read as octal.
    pub fn change_permissions(&mut self, path: &str, value: u32) -> Result<()> {
        let (parent, name) = self.resolve_parent(path)?;
        let inode_index = parent.dir.inode_of(&name)?;
        let mut inode = self.inode_table.read(&self.image, inode_index)?;
        self.check_write(&inode, &name)?;

        inode.change_permissions(value)?;
        self.inode_table.save(&mut self.image, &inode, inode_index)?;
        info!("chmod {value} {path}");
        Ok(())
    }

    pub fn change_owner(&mut self, path: &str, username: &str) -> Result<()> {
        let line = self.read_file(&format!("{USERS_DIR}/{username}"))?;
        let user = User::parse_line(&line)?;

        let (parent, name) = self.resolve_parent(path)?;
        let inode_index = parent.dir.inode_of(&name)?;
        let mut inode = self.inode_table.read(&self.image, inode_index)?;
        inode.user_id = user.user_id;
        self.inode_table.save(&mut self.image, &inode, inode_index)?;
        info!("chown {username} {path}");
        Ok(())
    }
}

/// User administration.
impl FileSystem {
    /// Create a user record and, for non-root ids, a home directory owned by
    /// the new user.
    pub fn add_user(&mut self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || username.contains('/') || username.contains(char::is_whitespace)
        {
            return Err(FsError::IllegalArgument(format!("username {username:?}")));
        }

        let users_dir = self.resolve_dir(USERS_DIR)?;
        if users_dir.dir.contains(username) {
            return Err(FsError::AlreadyExists(username.to_string()));
        }
        self.check_write(&users_dir.inode, username)?;

        let user = self.users.create(username, password);
        self.create_entity(&format!("{USERS_DIR}/{username}"), true, &user.to_line(), false)?;

        if user.user_id != ROOT_USER_ID {
            let home = format!("/{username}");
            self.create_entity(&home, false, "", false)?;
            self.change_owner(&home, username)?;
        }

        info!("added user {username} (id {})", user.user_id);
        Ok(())
    }

    /// Verify the password and switch the session to `username`.
    pub fn change_user(&mut self, username: &str, password: &str) -> Result<()> {
        let line = self.read_file(&format!("{USERS_DIR}/{username}"))?;
        let user = User::verify(&line, password)?;

        self.change_directory("/")?;
        let is_root = user.user_id == ROOT_USER_ID;
        self.users.set_current(user);
        if !is_root {
            self.change_directory(&format!("/{username}"))?;
        }

        info!("current user is now {username}");
        Ok(())
    }

    /// Remove a user record and home directory; root only.
    pub fn delete_user(&mut self, username: &str) -> Result<()> {
        match self.users.current() {
            Some(user) if user.user_id == ROOT_USER_ID => {}
            _ => {
                return Err(FsError::PermissionDenied(format!("deleteuser {username}")));
            }
        }
        if username == "root" {
            return Err(FsError::IllegalArgument(
                "cannot delete the root user".to_string(),
            ));
        }

        let line = self.read_file(&format!("{USERS_DIR}/{username}"))?;
        let user = User::parse_line(&line)?;
        self.users.delete(user.user_id);
        self.delete(&format!("{USERS_DIR}/{username}"))?;

        let root = self.resolve_dir("/")?;
        if root.dir.contains(username) {
            self.delete(&format!("/{username}"))?;
        }

        info!("deleted user {username}");
        Ok(())
    }
}

/// Allocation plumbing.
impl FileSystem {
    fn needed_blocks(&self, content_len: usize) -> u32 {
        ((content_len as u64).div_ceil(u64::from(self.superblock.block_size))).max(1) as u32
    }

    fn allocate_blocks(&mut self, count: u32) -> Result<Vec<u32>> {
        let mut blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.block_bitmap.take_free_bit() {
                Ok(block) => {
                    self.superblock.free_block_count -= 1;
                    blocks.push(block);
                }
                Err(err) => {
                    self.release_blocks(&blocks)?;
                    return Err(err);
                }
            }
        }
        Ok(blocks)
    }

    fn release_blocks(&mut self, blocks: &[u32]) -> Result<()> {
        for block in blocks {
            self.block_bitmap.set(*block, false)?;
            self.superblock.free_block_count += 1;
        }
        Ok(())
    }

    /// Re-encode a directory and write it back, growing or shrinking its
    /// block set to fit the record stream.
    fn save_directory(&mut self, handle: &mut DirHandle) -> Result<()> {
        let data = handle.dir.encode();
        let needed = self.needed_blocks(data.len());
        if needed as usize > DIRECT_POINTERS {
            return Err(FsError::FileTooLarge(handle.path.clone()));
        }

        let old = handle.inode.file_size;
        if needed > old {
            let extra = self.allocate_blocks(needed - old)?;
            handle.inode.blocks[old as usize..needed as usize].copy_from_slice(&extra);
        } else {
            let zeros = vec![0u8; self.superblock.block_size as usize];
            for i in needed..old {
                let block = handle.inode.blocks[i as usize];
                self.image
                    .write_at(&zeros, self.block_store.block_offset(block))?;
                self.block_bitmap.set(block, false)?;
                self.superblock.free_block_count += 1;
                handle.inode.blocks[i as usize] = 0;
            }
        }
        handle.inode.file_size = needed;

        self.block_store
            .write_blocks(&mut self.image, &handle.inode, &data)?;
        self.inode_table
            .save(&mut self.image, &handle.inode, handle.inode_index)?;
        if needed != old {
            self.block_bitmap.save(&mut self.image)?;
            self.superblock.save(&mut self.image)?;
        }
        Ok(())
    }
}
