use clap::Parser;
use imagefs::cli_interface::{ImageFsCli, Shell};

/// A CLI to create a filesystem image or drive one interactively.
///
/// `shell` blocks on stdin until `exit`; `mkfs` formats the image and
/// returns.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = ImageFsCli::parse();

    match args {
        ImageFsCli::Mkfs(args) => {
            let fs = imagefs::mkfs::mkfs(&args.image_file_path, args.size, args.block_size)?;
            fs.flush()?;
            println!("Formatted {}.", args.image_file_path);
        }
        ImageFsCli::Shell(args) => {
            Shell::start(&args.image_file_path)?;
        }
    }
    Ok(())
}
