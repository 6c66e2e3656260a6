//! Unified error handling for multidex
//!
//! Every fallible operation in the crate returns [`MultiDexError`]. External
//! decoders and pools can surface their own failures through
//! [`MultiDexError::Other`].

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for multidex operations
#[derive(Debug, Error)]
pub enum MultiDexError {
    /// A container was initialized a second time
    #[error("Container already initialized")]
    AlreadyInitialized,

    /// Two entries of one container share a name
    #[error("Duplicate entry name '{0}'")]
    DuplicateEntryName(String),

    /// The source resolved to a container without any dex entries
    #[error("Empty multi-dex container: {}", .0.display())]
    EmptyContainer(PathBuf),

    /// More than one dex entry found where a single dex was expected
    #[error("Multi-dex container detected: {}", .0.display())]
    MultiDexDetected(PathBuf),

    /// The source path is neither a directory nor a regular file
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Leading bytes do not carry a dex magic
    #[error("Invalid dex magic in '{}'", .0.display())]
    InvalidDexMagic(PathBuf),

    /// A dex image is truncated or internally inconsistent
    #[error("Malformed dex '{name}': {reason}")]
    MalformedDex { name: String, reason: String },

    /// The pool overflowed before the main dex reached its class floor
    #[error("Dex pool overflowed while writing type {position} of {required}")]
    PoolOverflow { position: usize, required: usize },

    /// One class alone overflows an empty pool
    #[error("Type too big for dex pool: {0}")]
    ClassTooLarge(String),

    /// Single-dex output was requested
    #[error("Non-multidex output is not supported, write a single dex with write_raw_dex instead")]
    SingleDexUnsupported,

    /// A writer thread panicked
    #[error("Writer thread panicked: {0}")]
    WorkerPanicked(String),

    /// File I/O error
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Zip archive error
    #[error("Zip error for '{}': {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Failure raised by an external decoder or pool
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for multidex operations
pub type Result<T> = std::result::Result<T, MultiDexError>;

impl MultiDexError {
    /// Check if this error means the requested capacity cannot hold the input
    pub fn is_capacity_error(&self) -> bool {
        matches!(
            self,
            MultiDexError::PoolOverflow { .. } | MultiDexError::ClassTooLarge(_)
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            MultiDexError::MultiDexDetected(path) => format!(
                "'{}' holds several dex files; enable multi-dex to read it",
                path.display()
            ),
            MultiDexError::PoolOverflow { required, .. } => format!(
                "The main dex cannot hold {required} classes; lower the main dex class count"
            ),
            MultiDexError::ClassTooLarge(ty) => {
                format!("Class {ty} does not fit in a single dex file")
            }
            _ => self.to_string(),
        }
    }

    pub(crate) fn duplicate_entry_name(entry_name: impl Into<String>) -> Self {
        MultiDexError::DuplicateEntryName(entry_name.into())
    }

    pub(crate) fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        MultiDexError::MalformedDex {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn from_zip_error(path: &Path, error: zip::result::ZipError) -> Self {
        MultiDexError::Zip {
            path: path.to_path_buf(),
            source: error,
        }
    }
}

/// Convert IO errors with path context
impl MultiDexError {
    pub fn from_io_error(path: impl Into<String>, error: io::Error) -> Self {
        MultiDexError::Io {
            path: path.into(),
            source: error,
        }
    }
}
