//! Archive streaming and archive-based copy.
//!
//! The source side walks a path and writes a tar stream into an in-process
//! pipe; the read end is pumped through [`reader_chan`], so the archive
//! travels as checksummed packets like any other byte stream.
//!
//! The destination side reverses this: [`write_chan`] verifies the packets
//! into a pipe and an extractor applies each tar entry to the destination
//! through the conflict rules in [`crate::conflict`].
//!
//! Entry names are `<root>` for the source itself and `<root>/<relative>`
//! for everything below it, where `<root>` is the source's base name. The
//! destination maps `<root>` onto the destination path.

use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use remotefs_iochan::{IoChanError, StreamReceiver, error_stream, reader_chan, write_chan};
use remotefs_protocol::{CopyOptions, Packet};
use tokio::io::{AsyncRead, DuplexStream, ReadBuf};
use tokio::sync::oneshot;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::conflict::{CopyAction, DestState, EntryKind, precheck_destination, resolve_entry};
use crate::paths::expand_home;
use crate::{FileOpsError, Limits};

/// Something that can produce an archive stream for a copy.
pub trait ArchiveSource: Send + Sync {
    /// Opens a checksummed archive stream of `path`.
    fn stream_archive(
        &self,
        path: &str,
        opts: CopyOptions,
        cancel: CancellationToken,
    ) -> StreamReceiver<Packet>;

    /// Resolves `path` when the source shares the destination's filesystem.
    ///
    /// Used to refuse copies of a path onto itself or into itself.
    fn local_path(&self, path: &str) -> Option<PathBuf> {
        let _ = path;
        None
    }

    /// Kind of the entry at `path` when it is known before streaming.
    fn source_kind(&self, path: &str) -> Option<EntryKind> {
        let metadata = std::fs::metadata(self.local_path(path)?).ok()?;
        Some(if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        })
    }
}

// ---------------------------------------------------------------------------
// Source side
// ---------------------------------------------------------------------------

/// Streams `path` as a tar archive.
///
/// A directory requires `opts.recursive`. Setup failures are delivered as
/// the stream's only item; failures while archiving become its terminal
/// error. Must be called inside a Tokio runtime.
pub fn stream_archive(
    cancel: CancellationToken,
    path: &str,
    opts: CopyOptions,
    limits: &Limits,
    home: &Path,
) -> StreamReceiver<Packet> {
    match start_archive(cancel, path, opts, limits, home) {
        Ok(rx) => rx,
        Err(e) => {
            debug!(path, error = %e, "stream_archive refused");
            error_stream(e)
        }
    }
}

fn start_archive(
    cancel: CancellationToken,
    path: &str,
    opts: CopyOptions,
    limits: &Limits,
    home: &Path,
) -> Result<StreamReceiver<Packet>, FileOpsError> {
    let root = expand_home(path, home)?;
    let metadata = std::fs::metadata(&root).map_err(|e| {
        FileOpsError::io(format!("cannot stat file {:?}", root.display().to_string()), e)
    })?;
    if metadata.is_dir() && !opts.recursive {
        return Err(FileOpsError::NotRecursive(path.to_string()));
    }
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());

    info!(path = %root.display(), "streaming archive");

    let (pipe_writer, pipe_reader) = tokio::io::duplex(limits.pipe_buffer_size.max(1));
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let archive_cancel = cancel.child_token();
    let walker_cancel = archive_cancel.clone();
    let bridge = SyncIoBridge::new(pipe_writer);
    tokio::task::spawn_blocking(move || {
        let result = write_archive(bridge, &root, &root_name, &walker_cancel);
        if let Err(e) = &result {
            debug!(path = %root.display(), error = %e, "archiver stopped");
        }
        let _ = outcome_tx.send(result.map_err(|e| e.to_string()));
    });

    let reader = ArchiveReader {
        pipe: pipe_reader,
        outcome: Some(outcome_rx),
    };
    Ok(reader_chan(
        cancel,
        reader,
        limits.file_chunk_size,
        limits.packet_capacity,
        move || archive_cancel.cancel(),
    ))
}

/// Writes the tar stream for `root`, entries in lexical pre-order.
///
/// Symlinks and special files are skipped. The writer is dropped on return,
/// which closes the pipe.
fn write_archive<W: Write>(
    writer: W,
    root: &Path,
    root_name: &str,
    cancel: &CancellationToken,
) -> Result<(), FileOpsError> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for entry in WalkDir::new(root).sort_by_file_name() {
        if cancel.is_cancelled() {
            return Err(FileOpsError::Cancelled);
        }
        let entry = entry.map_err(|e| {
            FileOpsError::io(
                format!("cannot archive {:?}", root.display().to_string()),
                io::Error::from(e),
            )
        })?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            warn!(path = %entry.path().display(), "skipping symlink");
            continue;
        }
        if !file_type.is_dir() && !file_type.is_file() {
            warn!(path = %entry.path().display(), "skipping special file");
            continue;
        }

        let name = match entry.path().strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => Path::new(root_name).join(rel),
            _ => PathBuf::from(root_name),
        };
        builder
            .append_path_with_name(entry.path(), &name)
            .map_err(|e| {
                FileOpsError::io(
                    format!("cannot archive {:?}", entry.path().display().to_string()),
                    e,
                )
            })?;
    }

    let mut writer = builder
        .into_inner()
        .map_err(|e| FileOpsError::io("cannot finish archive", e))?;
    writer
        .flush()
        .map_err(|e| FileOpsError::io("cannot finish archive", e))
}

/// Read end of the archive pipe.
///
/// At end of input it waits for the archiver's outcome, so a failed walk
/// surfaces as a read error instead of a short but valid-looking stream.
struct ArchiveReader {
    pipe: DuplexStream,
    outcome: Option<oneshot::Receiver<Result<(), String>>>,
}

impl AsyncRead for ArchiveReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.pipe).poll_read(cx, buf))?;
        if buf.filled().len() > before || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let Some(outcome) = self.outcome.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let result = ready!(Pin::new(outcome).poll(cx));
        self.outcome = None;
        match result {
            Ok(Ok(())) => Poll::Ready(Ok(())),
            Ok(Err(message)) => Poll::Ready(Err(io::Error::other(message))),
            Err(_) => Poll::Ready(Err(io::Error::other("archiver exited without a result"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Destination side
// ---------------------------------------------------------------------------

/// Copies `src_path` from `source` to `dest`, returning the archive size.
///
/// The destination root is checked before any stream is opened. Every
/// entry then goes through [`resolve_entry`]; the first conflict or I/O
/// error aborts the copy. A checksum mismatch is reported even though the
/// entries were already written. Dropping the returned future or cancelling
/// `cancel` stops both the source stream and the extractor.
pub async fn copy_archive(
    source: &dyn ArchiveSource,
    src_path: &str,
    dest: &Path,
    opts: CopyOptions,
    limits: &Limits,
    cancel: CancellationToken,
) -> Result<u64, FileOpsError> {
    if let Some(local) = source.local_path(src_path) {
        check_not_same_path(&local, dest, &opts).await?;
    }
    let state = DestState::probe(dest)?;
    let incoming = source.source_kind(src_path);
    precheck_destination(state, incoming, &opts).map_err(|conflict| FileOpsError::Conflict {
        path: dest.display().to_string(),
        conflict,
    })?;

    info!(src = src_path, dest = %dest.display(), ?opts, "starting archive copy");

    let copy_cancel = cancel.child_token();
    let _guard = copy_cancel.clone().drop_guard();
    let archive = source.stream_archive(src_path, opts, copy_cancel.clone());

    let (pipe_writer, pipe_reader) = tokio::io::duplex(limits.pipe_buffer_size.max(1));
    let writer = tokio::spawn(write_chan(copy_cancel.clone(), pipe_writer, archive));

    let bridge = SyncIoBridge::new(pipe_reader);
    let extract_dest = dest.to_path_buf();
    let extract_cancel = copy_cancel.clone();
    let extracted = tokio::task::spawn_blocking(move || {
        extract_archive(bridge, &extract_dest, &opts, &extract_cancel)
    })
    .await?;
    if extracted.is_err() {
        copy_cancel.cancel();
    }
    let written = writer.await?;

    if cancel.is_cancelled() {
        return Err(FileOpsError::Cancelled);
    }
    match (extracted, written) {
        (Ok(()), Ok(bytes)) => {
            info!(dest = %dest.display(), bytes, "archive copy complete");
            Ok(bytes)
        }
        (Ok(()), Err(e)) => Err(e.into()),
        // A broken source stream explains a broken extraction.
        (
            Err(_),
            Err(
                e @ (IoChanError::Remote(_)
                | IoChanError::ChecksumMismatch
                | IoChanError::Truncated),
            ),
        ) => Err(e.into()),
        (Err(e), _) => Err(e),
    }
}

/// Refuses copies onto the source itself or into a directory below it, and
/// overwriting copies onto a directory that contains the source.
///
/// Both paths are canonicalized; a missing destination is judged by its
/// parent. A missing source passes, the source stream reports it.
pub async fn check_not_same_path(
    src: &Path,
    dest: &Path,
    opts: &CopyOptions,
) -> Result<(), FileOpsError> {
    let Ok(src) = tokio::fs::canonicalize(src).await else {
        return Ok(());
    };
    let dest = match tokio::fs::canonicalize(dest).await {
        Ok(dest) => dest,
        Err(_) => match (dest.parent(), dest.file_name()) {
            (Some(parent), Some(name)) => match tokio::fs::canonicalize(parent).await {
                Ok(parent) => parent.join(name),
                Err(_) => return Ok(()),
            },
            _ => return Ok(()),
        },
    };

    if dest == src {
        return Err(FileOpsError::SamePath(dest.display().to_string()));
    }
    if dest.starts_with(&src) {
        return Err(FileOpsError::DestinationInsideSource {
            src: src.display().to_string(),
            dest: dest.display().to_string(),
        });
    }
    // Replacing the destination root would delete the source mid-walk.
    if opts.overwrite && src.starts_with(&dest) {
        return Err(FileOpsError::SourceInsideDestination {
            src: src.display().to_string(),
            dest: dest.display().to_string(),
        });
    }
    Ok(())
}

/// Applies every entry of the tar stream in `reader` under `dest`, then
/// reads the stream to its end so the writer side can finish.
fn extract_archive<R: Read>(
    reader: R,
    dest: &Path,
    opts: &CopyOptions,
    cancel: &CancellationToken,
) -> Result<(), FileOpsError> {
    let read_err = |e: io::Error| FileOpsError::io("cannot read archive stream", e);
    let mut archive = tar::Archive::new(reader);
    let mut applied = 0usize;

    for entry in archive.entries().map_err(read_err)? {
        if cancel.is_cancelled() {
            return Err(FileOpsError::Cancelled);
        }
        let mut entry = entry.map_err(read_err)?;
        let name = entry.path().map_err(read_err)?.into_owned();
        let target = entry_target(dest, &name)?;

        let kind = match entry.header().entry_type() {
            tar::EntryType::Directory => EntryKind::Directory,
            tar::EntryType::Regular | tar::EntryType::Continuous => EntryKind::File,
            other => {
                warn!(name = %name.display(), entry_type = ?other, "skipping unsupported archive entry");
                continue;
            }
        };
        let default_mode = match kind {
            EntryKind::Directory => 0o755,
            EntryKind::File => 0o644,
        };
        let mode = entry.header().mode().unwrap_or(default_mode) & 0o7777;

        apply_entry(&target, kind, mode, &mut entry, opts)?;
        applied += 1;
    }

    // The archive ends before the stream does (trailing zero blocks).
    let mut rest = archive.into_inner();
    io::copy(&mut rest, &mut io::sink()).map_err(read_err)?;

    debug!(dest = %dest.display(), entries = applied, "archive extracted");
    Ok(())
}

/// Maps an entry name onto the destination: the first component is the
/// source root and is replaced by `dest`.
fn entry_target(dest: &Path, name: &Path) -> Result<PathBuf, FileOpsError> {
    let traversal = || FileOpsError::Traversal(name.display().to_string());
    let mut components = name.components();
    match components.next() {
        Some(Component::Normal(_)) => {}
        _ => return Err(traversal()),
    }

    let mut target = dest.to_path_buf();
    for component in components {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal());
            }
        }
    }
    Ok(target)
}

fn apply_entry(
    target: &Path,
    kind: EntryKind,
    mode: u32,
    data: &mut impl Read,
    opts: &CopyOptions,
) -> Result<(), FileOpsError> {
    let state = DestState::probe(target)?;
    let action = resolve_entry(state, kind, opts).map_err(|conflict| FileOpsError::Conflict {
        path: target.display().to_string(),
        conflict,
    })?;
    debug!(path = %target.display(), ?action, "applying archive entry");

    match action {
        CopyAction::MergeDir => Ok(()),
        CopyAction::CreateDir => create_dir(target, mode),
        CopyAction::CreateFile => write_entry_file(target, mode, data),
        CopyAction::ReplaceWithDir => {
            remove_existing(target, state)?;
            create_dir(target, mode)
        }
        CopyAction::ReplaceWithFile => {
            remove_existing(target, state)?;
            write_entry_file(target, mode, data)
        }
    }
}

fn remove_existing(target: &Path, state: DestState) -> Result<(), FileOpsError> {
    let result = match state {
        DestState::Directory => std::fs::remove_dir_all(target),
        _ => std::fs::remove_file(target),
    };
    result.map_err(|e| {
        FileOpsError::io(format!("cannot remove {:?}", target.display().to_string()), e)
    })
}

fn create_dir(target: &Path, mode: u32) -> Result<(), FileOpsError> {
    std::fs::create_dir_all(target).map_err(|e| {
        FileOpsError::io(
            format!("cannot create directory {:?}", target.display().to_string()),
            e,
        )
    })?;
    set_mode(target, mode)
}

fn write_entry_file(target: &Path, mode: u32, data: &mut impl Read) -> Result<(), FileOpsError> {
    let context = || format!("cannot write file {:?}", target.display().to_string());
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FileOpsError::io(context(), e))?;
    }
    let mut file = std::fs::File::create(target).map_err(|e| FileOpsError::io(context(), e))?;
    io::copy(data, &mut file).map_err(|e| FileOpsError::io(context(), e))?;
    drop(file);
    set_mode(target, mode)
}

#[cfg(unix)]
fn set_mode(target: &Path, mode: u32) -> Result<(), FileOpsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        FileOpsError::io(
            format!("cannot set mode on {:?}", target.display().to_string()),
            e,
        )
    })
}

#[cfg(not(unix))]
fn set_mode(_target: &Path, _mode: u32) -> Result<(), FileOpsError> {
    Ok(())
}
