use crate::fs::{DEFAULT_BLOCK_SIZE, DEFAULT_IMAGE_NAME, DEFAULT_IMAGE_SIZE};
use clap::Parser;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum ImageFsCli {
    /// create a new file system image
    Mkfs(MkfsArgs),
    /// open an image and start the interactive shell
    Shell(ShellArgs),
}

/// make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system image")]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long, default_value = DEFAULT_IMAGE_NAME)]
    pub image_file_path: String,
    /// the size of the file system in bytes
    #[clap(short, long, default_value_t = DEFAULT_IMAGE_SIZE)]
    pub size: u32,
    /// the block size of the file system
    #[clap(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: u32,
}

/// shell subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "open an image and start the shell")]
pub struct ShellArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long, default_value = DEFAULT_IMAGE_NAME)]
    pub image_file_path: String,
}
