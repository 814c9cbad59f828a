//! Error types shared across the crate.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while reading, writing, or discovering documents.
///
/// Recoverable conditions (`MissingFile`, `AlreadyExists`, `DeleteMissing`,
/// `ResourceBusy`) carry the offending path. `BadMode` and `PathUndefined`
/// are programmer errors and should surface during development, not in
/// steady-state use.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Create failed! The document already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Delete failed! The document does not exist: {}", .0.display())]
    DeleteMissing(PathBuf),

    #[error("The following resource is busy: {}", .0.display())]
    ResourceBusy(PathBuf),

    #[error("The read mode can not be changed after the data has been set")]
    BadMode,

    #[error("No path is defined for the given arguments: {0}")]
    PathUndefined(String),

    #[error("Invalid document structure, expected a key-value mapping: {}", .0.display())]
    InvalidDocument(PathBuf),

    #[error("Document key path cannot be empty")]
    EmptyKeyPath,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to enumerate glob match: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Failed to build path matcher: {0}")]
    Regex(#[from] regex::Error),
}
