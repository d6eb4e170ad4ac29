//! Directory listings streamed in batches.

use std::path::{Path, PathBuf};

use remotefs_iochan::{StreamReceiver, StreamSender, stream_channel};
use remotefs_protocol::{EntryInfo, ListEntriesOptions, ListEntriesResponse};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::stat::entry_info;
use crate::{FileOpsError, Limits};

/// Lists the directory at the already expanded `path`.
///
/// Single-level listings return the sorted children in the window
/// `[offset, offset + limit)`, with `limit` capped at
/// [`Limits::max_dir_size`] (zero meaning the cap). With `opts.all` the
/// directory is walked recursively in lexical pre-order; every visited
/// path (the root included) counts towards the window but only files are
/// returned.
///
/// Results arrive in batches of [`Limits::dir_chunk_size`]. Failures are
/// reported as the terminal error; cancellation ends the stream silently.
pub fn list_entries(
    cancel: CancellationToken,
    path: PathBuf,
    opts: ListEntriesOptions,
    limits: Limits,
    home: PathBuf,
) -> StreamReceiver<ListEntriesResponse> {
    let (tx, rx) = stream_channel(limits.stream_capacity, cancel);
    tokio::spawn(async move {
        if let Err(e) = run_listing(&tx, &path, opts, &limits, &home).await {
            if e.is_cancelled() {
                debug!(path = %path.display(), "listing cancelled");
            } else {
                let _ = tx.send_error(e).await;
            }
        }
    });
    rx
}

async fn run_listing(
    tx: &StreamSender<ListEntriesResponse>,
    path: &Path,
    opts: ListEntriesOptions,
    limits: &Limits,
    home: &Path,
) -> Result<(), FileOpsError> {
    let paths = if opts.all {
        let limit = if opts.limit == 0 {
            limits.max_dir_size
        } else {
            opts.limit
        };
        let root = path.to_path_buf();
        let cancel = tx.cancel_token().clone();
        tokio::task::spawn_blocking(move || walk_files(&root, opts.offset, limit, &cancel))
            .await?
    } else {
        let limit = match opts.limit {
            0 => limits.max_dir_size,
            n => n.min(limits.max_dir_size),
        };
        read_children(path)
            .await?
            .into_iter()
            .skip(opts.offset)
            .take(limit)
            .collect()
    };
    send_batches(tx, paths, limits, home).await
}

/// Stats `paths` in order, sending each batch as soon as it is full.
async fn send_batches(
    tx: &StreamSender<ListEntriesResponse>,
    paths: Vec<PathBuf>,
    limits: &Limits,
    home: &Path,
) -> Result<(), FileOpsError> {
    let batch_size = limits.dir_chunk_size.max(1);
    let mut batch: Vec<EntryInfo> = Vec::with_capacity(batch_size);
    for path in paths {
        if tx.is_cancelled() {
            return Err(FileOpsError::Cancelled);
        }
        match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => batch.push(entry_info(&path, &metadata, home)),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable entry"),
        }
        if batch.len() >= batch_size {
            tx.send(ListEntriesResponse {
                file_info: std::mem::take(&mut batch),
            })
            .await?;
        }
    }
    if !batch.is_empty() {
        tx.send(ListEntriesResponse { file_info: batch }).await?;
    }
    Ok(())
}

/// Returns the children of `dir` sorted by name.
pub(crate) async fn read_children(dir: &Path) -> Result<Vec<PathBuf>, FileOpsError> {
    let context = || format!("cannot read directory {:?}", dir.display().to_string());
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FileOpsError::io(context(), e))?;

    let mut children = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| FileOpsError::io(context(), e))?
    {
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

/// Walks `root` in lexical pre-order and collects the files whose visit
/// index falls inside `[offset, offset + limit)`.
fn walk_files(
    root: &Path,
    offset: usize,
    limit: usize,
    cancel: &CancellationToken,
) -> Vec<PathBuf> {
    let end = offset.saturating_add(limit);
    let mut files = Vec::new();
    for (index, entry) in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .enumerate()
    {
        if index >= end || cancel.is_cancelled() {
            break;
        }
        if index < offset {
            continue;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry during walk");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    files
}
