//! Remote file operations for one endpoint.
//!
//! [`FileServer`] implements every operation of the [`RemoteFileOps`] trait
//! against the local filesystem. Other endpoints are registered by name as
//! [`ArchiveSource`]s so `file_copy` can pull trees from them through the
//! same checksummed archive stream.
//!
//! [`ArchiveSource`]: remotefs_file_ops::ArchiveSource

mod config;
mod handler;
mod server;

pub use config::ServerConfig;
pub use handler::{OpsFuture, RemoteFileOps};
pub use server::FileServer;

use remotefs_file_ops::FileOpsError;
use remotefs_protocol::LocatorError;

/// Errors produced by the file server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    FileOps(#[from] FileOpsError),

    #[error("invalid source locator: {0}")]
    Locator(#[from] LocatorError),

    #[error("unknown endpoint {0:?}")]
    UnknownEndpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// Returns `true` when the operation was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServerError::FileOps(e) if e.is_cancelled())
    }
}
