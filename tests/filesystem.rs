//! End-to-end scenarios against a freshly formatted image.

use imagefs::{FileSystem, FsError};
use tempfile::TempDir;

const IMAGE_SIZE: u32 = 1024 * 1024;
const BLOCK_SIZE: u32 = 1024;

fn fresh_fs(dir: &TempDir) -> FileSystem {
    FileSystem::format(dir.path().join("filesystem.data"), IMAGE_SIZE, BLOCK_SIZE)
        .expect("failed to format filesystem")
}

/// The superblock's free counters must mirror the bitmaps at all times.
fn assert_counters_consistent(fs: &FileSystem) {
    assert_eq!(
        fs.superblock().free_block_count,
        fs.block_bitmap().count_free(),
        "free block counter diverged from the block bitmap"
    );
    assert_eq!(
        fs.superblock().free_inode_count,
        fs.inode_bitmap().count_free(),
        "free inode counter diverged from the inode bitmap"
    );
}

#[test]
fn test_format_then_read_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let fs = fresh_fs(&dir);

    // `.users` is hidden, so a fresh root lists only the dot entries
    assert_eq!(fs.list()?, vec![".", ".."]);
    assert_eq!(fs.current_path(), "/");
    assert_eq!(fs.current_user_name(), "root");

    // the root inode is index 0 and allocated
    assert!(fs.inode_bitmap().get(0)?);
    assert!(!fs.read_inode(0)?.is_file());
    assert_counters_consistent(&fs);
    Ok(())
}

#[test]
fn test_create_read_edit_delete_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("test.txt", "Hello, World!")?;
    assert_eq!(fs.read_file("test.txt")?, "Hello, World!");

    fs.edit_file("test.txt", "Updated file content")?;
    assert_eq!(fs.read_file("test.txt")?, "Updated file content");

    fs.delete("test.txt")?;
    assert!(matches!(
        fs.read_file("test.txt"),
        Err(FsError::NotFound(_))
    ));
    assert_counters_consistent(&fs);
    Ok(())
}

#[test]
fn test_delete_directory_with_nested_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    for i in 1..=10 {
        fs.create_directory(&format!("dir{i}"))?;
        fs.change_directory(&format!("dir{i}"))?;
        fs.create_file(&format!("file{i}"), "")?;
    }
    fs.change_directory("/")?;

    let free_blocks_before = fs.superblock().free_block_count;
    let free_inodes_before = fs.superblock().free_inode_count;

    fs.delete("/dir1")?;

    // 10 directories and 10 files, one block and one inode each
    assert_eq!(fs.superblock().free_block_count, free_blocks_before + 20);
    assert_eq!(fs.superblock().free_inode_count, free_inodes_before + 20);
    assert_counters_consistent(&fs);

    assert!(matches!(
        fs.change_directory("dir1"),
        Err(FsError::NotFound(_))
    ));
    Ok(())
}

#[test]
fn test_image_idempotency() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);
    let snapshot = fs.image_bytes().to_vec();

    fs.create_directory("dir")?;
    fs.create_file("file", "file content")?;
    fs.change_directory("dir")?;
    fs.create_file("otherfile", "other file content")?;
    fs.create_directory("otherdir")?;
    fs.change_directory("..")?;
    fs.delete("dir")?;
    fs.delete("file")?;

    let current = fs.image_bytes();
    assert_eq!(current.len(), snapshot.len());
    if let Some(position) = snapshot
        .iter()
        .zip(current.iter())
        .position(|(expected, got)| expected != got)
    {
        panic!(
            "image diverged at byte {position}: expected {:#04x}, got {:#04x}",
            snapshot[position], current[position]
        );
    }
    Ok(())
}

#[test]
fn test_multi_block_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);
    let snapshot = fs.image_bytes().to_vec();
    let content = "#".repeat(5000);

    let free_before = fs.superblock().free_block_count;
    fs.create_file("big", &content)?;
    assert_eq!(fs.superblock().free_block_count, free_before - 5);
    assert_eq!(fs.read_file("big")?, content);
    assert_counters_consistent(&fs);

    fs.delete("big")?;
    assert_eq!(fs.image_bytes(), snapshot.as_slice());
    Ok(())
}

#[test]
fn test_edit_grows_and_shrinks_block_set() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("f", "small")?;
    let free_after_create = fs.superblock().free_block_count;

    let big = "x".repeat(3 * BLOCK_SIZE as usize + 10);
    fs.edit_file("f", &big)?;
    assert_eq!(fs.superblock().free_block_count, free_after_create - 3);
    assert_eq!(fs.read_file("f")?, big);

    fs.edit_file("f", "tiny again")?;
    assert_eq!(fs.superblock().free_block_count, free_after_create);
    assert_eq!(fs.read_file("f")?, "tiny again");
    assert_counters_consistent(&fs);
    Ok(())
}

#[test]
fn test_append() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("log", "one")?;
    fs.append_to_file("log", " two")?;
    assert_eq!(fs.read_file("log")?, "one two");
    Ok(())
}

#[test]
fn test_file_larger_than_direct_pointers_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);
    let snapshot = fs.image_bytes().to_vec();

    let content = "#".repeat(12 * BLOCK_SIZE as usize + 1);
    assert!(matches!(
        fs.create_file("huge", &content),
        Err(FsError::FileTooLarge(_))
    ));
    // nothing was allocated or written
    assert_eq!(fs.image_bytes(), snapshot.as_slice());

    fs.create_file("f", "x")?;
    assert!(matches!(
        fs.edit_file("f", &content),
        Err(FsError::FileTooLarge(_))
    ));
    Ok(())
}

#[test]
fn test_read_of_block_aligned_payload_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("aligned", &"#".repeat(BLOCK_SIZE as usize))?;
    assert!(matches!(
        fs.read_file("aligned"),
        Err(FsError::MissingNulTerminator(_))
    ));
    Ok(())
}

#[test]
fn test_cd_errors() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    assert!(matches!(
        fs.change_directory("missing"),
        Err(FsError::NotFound(_))
    ));

    fs.create_file("plain", "x")?;
    assert!(matches!(
        fs.change_directory("plain"),
        Err(FsError::NotADirectory(_))
    ));

    fs.create_directory("a")?;
    fs.change_directory("a")?;
    assert_eq!(fs.current_path(), "/a");
    fs.change_directory("..")?;
    assert_eq!(fs.current_path(), "/");
    Ok(())
}

#[test]
fn test_directories_always_hold_dot_entries() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_directory("nested")?;
    fs.change_directory("nested")?;
    let names = fs.list()?;
    assert_eq!(&names[..2], &[".", ".."]);

    assert!(matches!(fs.delete("."), Err(FsError::IllegalArgument(_))));
    assert!(matches!(fs.delete(".."), Err(FsError::IllegalArgument(_))));
    Ok(())
}

#[test]
fn test_move_entry() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("a", "payload")?;
    fs.create_directory("target")?;

    fs.move_entry("a", "b")?;
    assert!(matches!(fs.read_file("a"), Err(FsError::NotFound(_))));
    assert_eq!(fs.read_file("b")?, "payload");

    let free_blocks = fs.superblock().free_block_count;
    fs.move_entry("b", "target/b")?;
    assert_eq!(fs.read_file("target/b")?, "payload");
    // a move allocates nothing
    assert_eq!(fs.superblock().free_block_count, free_blocks);

    fs.create_file("clash", "x")?;
    assert!(matches!(
        fs.move_entry("clash", "target/b"),
        Err(FsError::AlreadyExists(_))
    ));
    assert_counters_consistent(&fs);
    Ok(())
}

#[test]
fn test_copy_directory_tree() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_directory("src")?;
    fs.create_file("src/a", "alpha")?;
    fs.create_directory("src/inner")?;
    fs.create_file("src/inner/b", "beta")?;

    fs.copy_entry("src", "dst")?;

    assert_eq!(fs.read_file("dst/a")?, "alpha");
    assert_eq!(fs.read_file("dst/inner/b")?, "beta");
    // the source is intact
    assert_eq!(fs.read_file("src/a")?, "alpha");
    assert_counters_consistent(&fs);
    Ok(())
}

#[test]
fn test_permissions_scenario() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("file", "x")?;
    fs.change_permissions("file", 60)?;
    fs.add_user("u", "p")?;

    fs.change_user("u", "p")?;
    assert_eq!(fs.current_path(), "/u");
    assert!(matches!(
        fs.read_file("/file"),
        Err(FsError::PermissionDenied(_))
    ));

    fs.change_user("root", "root")?;
    fs.change_permissions("/file", 66)?;
    fs.change_user("u", "p")?;
    assert_eq!(fs.read_file("/file")?, "x");
    Ok(())
}

#[test]
fn test_user_administration() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.add_user("alice", "secret")?;
    // the registry and the on-disk record agree
    let record = fs.read_file("/.users/alice")?;
    assert!(record.starts_with("alice 1 "));

    assert!(matches!(
        fs.change_user("alice", "wrong"),
        Err(FsError::IncorrectPassword)
    ));
    fs.change_user("alice", "secret")?;
    assert_eq!(fs.current_user_name(), "alice");
    assert_eq!(fs.current_path(), "/alice");

    // only root may add or delete users
    assert!(matches!(
        fs.add_user("bob", "b"),
        Err(FsError::PermissionDenied(_))
    ));
    assert!(matches!(
        fs.delete_user("alice"),
        Err(FsError::PermissionDenied(_))
    ));

    fs.change_user("root", "root")?;
    fs.delete_user("alice")?;
    assert!(matches!(
        fs.read_file("/.users/alice"),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        fs.change_directory("/alice"),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        fs.delete_user("root"),
        Err(FsError::IllegalArgument(_))
    ));
    assert_counters_consistent(&fs);
    Ok(())
}

#[test]
fn test_remount_preserves_state() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("filesystem.data");

    {
        let mut fs = FileSystem::format(&path, IMAGE_SIZE, BLOCK_SIZE)?;
        fs.create_directory("docs")?;
        fs.create_file("docs/readme", "remember me")?;
        fs.add_user("alice", "secret")?;
        fs.flush()?;
    }

    let mut fs = FileSystem::open(&path)?;
    assert_eq!(fs.current_user_name(), "root");
    assert_eq!(fs.read_file("docs/readme")?, "remember me");
    fs.change_user("alice", "secret")?;
    assert_eq!(fs.current_path(), "/alice");
    assert_counters_consistent(&fs);
    Ok(())
}

#[test]
fn test_create_duplicate_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("dup", "x")?;
    assert!(matches!(
        fs.create_file("dup", "y"),
        Err(FsError::AlreadyExists(_))
    ));
    assert!(matches!(
        fs.create_directory("dup"),
        Err(FsError::AlreadyExists(_))
    ));
    Ok(())
}

#[test]
fn test_long_listing_shape() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);

    fs.create_file("file", "x")?;
    let lines = fs.list_long()?;
    let line = lines
        .iter()
        .find(|line| line.ends_with("\tfile"))
        .expect("file missing from long listing");

    let fields: Vec<&str> = line.split('\t').collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[0], "-rw-r--");
    assert_eq!(fields[1], "root");
    assert_eq!(fields[2], BLOCK_SIZE.to_string());
    Ok(())
}

#[test]
fn test_directory_grows_past_one_block() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut fs = fresh_fs(&dir);
    let snapshot = fs.image_bytes().to_vec();

    // 100 records of 11 bytes overflow a single 1 KiB block
    fs.create_directory("crowd")?;
    fs.change_directory("crowd")?;
    for i in 0..100 {
        fs.create_file(&format!("f-{i:02}"), "")?;
    }
    assert_eq!(fs.list()?.len(), 102);
    assert_counters_consistent(&fs);
    // the directory now spans two blocks
    let free_blocks = fs.superblock().free_block_count;
    assert_eq!(
        free_blocks,
        fs.superblock().block_count - 3 - 1 - 100 - 1,
        "expected one extra block for the grown directory"
    );

    fs.change_directory("/")?;
    fs.delete("crowd")?;
    assert_eq!(fs.image_bytes(), snapshot.as_slice());
    assert_counters_consistent(&fs);
    Ok(())
}
