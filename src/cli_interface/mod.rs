//! The command-line surface: argument structs and the interactive shell.
pub mod cli_struct;
pub mod shell;

pub use cli_struct::ImageFsCli;
pub use shell::Shell;
