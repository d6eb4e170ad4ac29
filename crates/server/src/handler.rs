//! The operation surface of a file-access endpoint.
//!
//! One method per operation. Streaming operations hand back a
//! [`StreamReceiver`] right away and produce into it from a background task;
//! single-shot operations return a boxed future so the trait stays object
//! safe.

use std::pin::Pin;

use remotefs_iochan::StreamReceiver;
use remotefs_protocol::{
    EntryInfo, FileCopyRequest, FileData, ListEntriesRequest, ListEntriesResponse, Packet,
    RenameRequest, StreamArchiveRequest, StreamFileRequest, WriteFileRequest,
};
use tokio_util::sync::CancellationToken;

use crate::ServerError;

/// A boxed future returned by single-shot operations.
pub type OpsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServerError>> + Send + 'a>>;

/// Remote file operations.
///
/// Every streaming method is governed by its `cancel` token: cancelling it
/// stops the producer without a terminal item.
pub trait RemoteFileOps: Send + Sync + 'static {
    /// Streams a file's bytes or a directory's entries, info first.
    fn stream_file(&self, req: StreamFileRequest, cancel: CancellationToken)
    -> StreamReceiver<FileData>;

    /// Streams a file or directory tree as a checksummed archive.
    fn stream_archive(
        &self,
        req: StreamArchiveRequest,
        cancel: CancellationToken,
    ) -> StreamReceiver<Packet>;

    /// Copies from a source locator (possibly another endpoint) to a local
    /// destination.
    fn file_copy(&self, req: FileCopyRequest, cancel: CancellationToken) -> OpsFuture<'_, ()>;

    /// Lists a directory in batches.
    fn list_entries(
        &self,
        req: ListEntriesRequest,
        cancel: CancellationToken,
    ) -> StreamReceiver<ListEntriesResponse>;

    /// Extended metadata for a path; missing paths are reported, not failed.
    fn stat(&self, path: String) -> OpsFuture<'_, EntryInfo>;

    /// Creates an empty file.
    fn touch(&self, path: String) -> OpsFuture<'_, ()>;

    /// Creates a directory and its parents.
    fn mkdir(&self, path: String) -> OpsFuture<'_, ()>;

    fn rename(&self, req: RenameRequest) -> OpsFuture<'_, ()>;

    /// Replaces a file's contents.
    fn write_file(&self, req: WriteFileRequest) -> OpsFuture<'_, ()>;

    /// Removes a file or an empty directory.
    fn delete(&self, path: String) -> OpsFuture<'_, ()>;

    /// Resolves path segments into one path and stats it.
    fn join(&self, segments: Vec<String>) -> OpsFuture<'_, EntryInfo>;
}
