//! Error type for filesystem operations.

use remotefs_iochan::IoChanError;
use remotefs_protocol::RangeError;

use crate::conflict::Conflict;

/// Errors produced by file operations.
#[derive(Debug, thiserror::Error)]
pub enum FileOpsError {
    #[error(transparent)]
    InvalidRange(#[from] RangeError),

    #[error("file {path:?} is too large to read ({size} bytes, max {max}), use stream_archive for large files")]
    TooLarge { path: String, size: i64, max: i64 },

    #[error("cannot copy to {path:?}, {conflict}")]
    Conflict { path: String, conflict: Conflict },

    #[error("cannot archive directory {0:?}, directory copy requires recursive option")]
    NotRecursive(String),

    #[error("source and destination are the same path: {0:?}")]
    SamePath(String),

    #[error("destination {dest:?} is inside source directory {src:?}")]
    DestinationInsideSource { src: String, dest: String },

    #[error("source {src:?} is inside destination {dest:?}, overwrite would remove it")]
    SourceInsideDestination { src: String, dest: String },

    #[error("{0:?} already exists")]
    AlreadyExists(String),

    #[error("cannot create directory {0:?}, file exists at path")]
    FileInTheWay(String),

    #[error("potential path traversal detected for path {0:?}")]
    Traversal(String),

    #[error("transfer failed: {0}")]
    Transfer(#[from] IoChanError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("cancelled")]
    Cancelled,
}

impl FileOpsError {
    /// Wraps an I/O error with a description naming the offending path.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        FileOpsError::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` when the operation stopped because it was cancelled.
    ///
    /// Cancelled operations are incomplete, not failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            FileOpsError::Cancelled | FileOpsError::Transfer(IoChanError::Cancelled)
        )
    }
}
