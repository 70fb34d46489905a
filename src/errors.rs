//! Error types shared by the filesystem core and the shell boundary.

use thiserror::Error;

/// Unified error type for all filesystem operations.
///
/// The first group of variants is raised by the core; the last four belong to
/// the shell boundary (argument shape and command dispatch). Host-store I/O
/// failures pass through unchanged via [`FsError::Io`].
#[derive(Debug, Error)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt image: {0}")]
    CorruptImage(String),

    #[error("record with this name already exists - {0}")]
    AlreadyExists(String),

    #[error("record not found - {0}")]
    NotFound(String),

    #[error("illegal argument - {0}")]
    IllegalArgument(String),

    #[error("record is not a file - {0}")]
    NotAFile(String),

    #[error("record is not a directory - {0}")]
    NotADirectory(String),

    #[error("null terminator not found in file - {0}")]
    MissingNulTerminator(String),

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("permission denied - {0}")]
    PermissionDenied(String),

    #[error("no free bit left in bitmap")]
    NoFreeBit,

    #[error("bitmap index {index} out of bounds ({size} bits)")]
    IndexOutOfBounds { index: u32, size: u32 },

    #[error("file does not fit into direct blocks - {0}")]
    FileTooLarge(String),

    #[error("missing arguments - {0}")]
    MissingArguments(String),

    #[error("unknown arguments - {0}")]
    UnknownArguments(String),

    #[error("incorrect file name - {0}")]
    IncorrectFileName(String),

    #[error("unknown command - {0}")]
    UnknownCommand(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FsError>;
