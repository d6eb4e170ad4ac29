//! Filesystem-backed implementation of [`RemoteFileOps`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use remotefs_file_ops::{self as file_ops, ArchiveSource, Limits};
use remotefs_iochan::{StreamReceiver, error_stream};
use remotefs_protocol::{
    CopyOptions, EntryInfo, FileCopyRequest, FileData, ListEntriesRequest, ListEntriesResponse,
    Packet, RenameRequest, SourceLocator, StreamArchiveRequest, StreamFileRequest,
    WriteFileRequest,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::handler::{OpsFuture, RemoteFileOps};
use crate::ServerError;

/// Serves file operations for one endpoint.
///
/// Paths starting with `~` resolve against the configured home directory.
/// Named endpoints registered with [`FileServer::with_endpoint`] can be
/// used as copy sources via `remote://<name>/<path>` locators.
pub struct FileServer {
    home: PathBuf,
    limits: Limits,
    endpoints: HashMap<String, Arc<dyn ArchiveSource>>,
}

impl FileServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            home: config.home_dir,
            limits: config.limits,
            endpoints: HashMap::new(),
        }
    }

    /// Registers another endpoint as a copy source.
    pub fn with_endpoint(mut self, name: impl Into<String>, source: Arc<dyn ArchiveSource>) -> Self {
        self.endpoints.insert(name.into(), source);
        self
    }

    pub fn home_dir(&self) -> &Path {
        &self.home
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn expand(&self, path: &str) -> Result<PathBuf, ServerError> {
        Ok(file_ops::expand_home(path, &self.home)?)
    }

    fn source_for(&self, locator: &SourceLocator) -> Result<&dyn ArchiveSource, ServerError> {
        match &locator.endpoint {
            None => Ok(self),
            Some(name) => self
                .endpoints
                .get(name)
                .map(|source| source.as_ref())
                .ok_or_else(|| ServerError::UnknownEndpoint(name.clone())),
        }
    }
}

impl ArchiveSource for FileServer {
    fn stream_archive(
        &self,
        path: &str,
        opts: CopyOptions,
        cancel: CancellationToken,
    ) -> StreamReceiver<Packet> {
        file_ops::stream_archive(cancel, path, opts, &self.limits, &self.home)
    }

    fn local_path(&self, path: &str) -> Option<PathBuf> {
        file_ops::expand_home(path, &self.home).ok()
    }
}

impl RemoteFileOps for FileServer {
    fn stream_file(
        &self,
        req: StreamFileRequest,
        cancel: CancellationToken,
    ) -> StreamReceiver<FileData> {
        debug!(path = %req.path, range = %req.byte_range, "stream_file");
        file_ops::stream_file(cancel, req.path, req.byte_range, self.limits, self.home.clone())
    }

    fn stream_archive(
        &self,
        req: StreamArchiveRequest,
        cancel: CancellationToken,
    ) -> StreamReceiver<Packet> {
        ArchiveSource::stream_archive(self, &req.path, req.opts, cancel)
    }

    fn file_copy(&self, req: FileCopyRequest, cancel: CancellationToken) -> OpsFuture<'_, ()> {
        Box::pin(async move {
            let locator = SourceLocator::parse(&req.src_uri)?;
            let dest = self.expand(&req.dest_path)?;
            let source = self.source_for(&locator)?;

            let result = file_ops::copy_archive(
                source,
                &locator.path,
                &dest,
                req.opts,
                &self.limits,
                cancel,
            )
            .await;
            match result {
                Ok(bytes) => {
                    info!(src = %locator, dest = %dest.display(), bytes, "file copy finished");
                    Ok(())
                }
                Err(e) if e.is_cancelled() => {
                    debug!(src = %locator, "file copy cancelled");
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn list_entries(
        &self,
        req: ListEntriesRequest,
        cancel: CancellationToken,
    ) -> StreamReceiver<ListEntriesResponse> {
        match self.expand(&req.path) {
            Ok(path) => {
                file_ops::list_entries(cancel, path, req.opts, self.limits, self.home.clone())
            }
            Err(e) => error_stream(e),
        }
    }

    fn stat(&self, path: String) -> OpsFuture<'_, EntryInfo> {
        Box::pin(async move {
            let full = self.expand(&path)?;
            Ok(file_ops::stat_path(&full, &self.home, true).await?)
        })
    }

    fn touch(&self, path: String) -> OpsFuture<'_, ()> {
        Box::pin(async move {
            let full = self.expand(&path)?;
            Ok(file_ops::touch_file(&full).await?)
        })
    }

    fn mkdir(&self, path: String) -> OpsFuture<'_, ()> {
        Box::pin(async move {
            let full = self.expand(&path)?;
            Ok(file_ops::make_dir(&full).await?)
        })
    }

    fn rename(&self, req: RenameRequest) -> OpsFuture<'_, ()> {
        Box::pin(async move {
            let from = self.expand(&req.path)?;
            let to = self.expand(&req.new_path)?;
            Ok(file_ops::rename_path(&from, &to).await?)
        })
    }

    fn write_file(&self, req: WriteFileRequest) -> OpsFuture<'_, ()> {
        Box::pin(async move {
            let full = self.expand(&req.path)?;
            Ok(file_ops::write_file(&full, &req.data, req.create_mode).await?)
        })
    }

    fn delete(&self, path: String) -> OpsFuture<'_, ()> {
        Box::pin(async move {
            let full = self.expand(&path)?;
            Ok(file_ops::delete_path(&full).await?)
        })
    }

    fn join(&self, segments: Vec<String>) -> OpsFuture<'_, EntryInfo> {
        Box::pin(async move {
            let full = file_ops::resolve_joined(&segments, &self.home)?;
            Ok(file_ops::stat_path(&full, &self.home, true).await?)
        })
    }
}
