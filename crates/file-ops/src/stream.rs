//! `stream_file`: a file's bytes or a directory's entries.

use std::io::SeekFrom;
use std::path::Path;

use remotefs_iochan::{StreamReceiver, StreamSender, stream_channel};
use remotefs_protocol::{ByteRange, EntryInfo, FileData, FileDataAt};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::list::read_children;
use crate::paths::expand_home;
use crate::stat::stat_path;
use crate::{FileOpsError, Limits};

/// Streams the file or directory at `path`.
///
/// The first response always carries the entry's info. A missing path ends
/// the stream right after it. Regular files follow with data chunks (each
/// tagged with its offset) covering `byte_range`, end exclusive; a range
/// starting past the end of the file yields no chunks. Directories follow
/// with entry batches: a `..` entry for the parent, then the sorted
/// children, the range selecting entries by index.
///
/// Files larger than [`Limits::max_file_size`] are refused after the info
/// response.
pub fn stream_file(
    cancel: CancellationToken,
    path: String,
    byte_range: String,
    limits: Limits,
    home: std::path::PathBuf,
) -> StreamReceiver<FileData> {
    let (tx, rx) = stream_channel(limits.stream_capacity, cancel);
    tokio::spawn(async move {
        if let Err(e) = run_stream(&tx, &path, &byte_range, &limits, &home).await {
            if e.is_cancelled() {
                debug!(path, "stream_file cancelled");
            } else {
                let _ = tx.send_error(e).await;
            }
        }
    });
    rx
}

async fn run_stream(
    tx: &StreamSender<FileData>,
    path: &str,
    byte_range: &str,
    limits: &Limits,
    home: &Path,
) -> Result<(), FileOpsError> {
    let range = ByteRange::parse(byte_range)?;
    let full_path = expand_home(path, home)?;
    let info = stat_path(&full_path, home, true).await?;
    let (not_found, is_dir, size) = (info.not_found, info.is_dir, info.size);

    tx.send(FileData {
        info: Some(info),
        ..Default::default()
    })
    .await?;

    if not_found {
        return Ok(());
    }
    if size > limits.max_file_size {
        return Err(FileOpsError::TooLarge {
            path: path.to_string(),
            size,
            max: limits.max_file_size,
        });
    }
    if is_dir {
        stream_dir(tx, &full_path, range, limits, home).await
    } else {
        stream_bytes(tx, &full_path, range, limits).await
    }
}

async fn stream_bytes(
    tx: &StreamSender<FileData>,
    path: &Path,
    range: ByteRange,
    limits: &Limits,
) -> Result<(), FileOpsError> {
    let context = || format!("cannot read file {:?}", path.display().to_string());
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| FileOpsError::io(context(), e))?;

    let mut offset = range.start();
    if offset > 0 {
        file.seek(SeekFrom::Start(offset as u64))
            .await
            .map_err(|e| FileOpsError::io(context(), e))?;
    }

    let mut buf = vec![0u8; limits.file_chunk_size.max(1)];
    loop {
        if tx.is_cancelled() {
            return Err(FileOpsError::Cancelled);
        }
        let want = match range.end() {
            Some(end) if offset >= end => break,
            Some(end) => buf.len().min((end - offset) as usize),
            None => buf.len(),
        };
        let n = file
            .read(&mut buf[..want])
            .await
            .map_err(|e| FileOpsError::io(context(), e))?;
        if n == 0 {
            break;
        }
        tx.send(FileData {
            data: buf[..n].to_vec(),
            at: Some(FileDataAt {
                offset,
                size: n as i64,
            }),
            ..Default::default()
        })
        .await?;
        offset += n as i64;
    }
    Ok(())
}

async fn stream_dir(
    tx: &StreamSender<FileData>,
    path: &Path,
    range: ByteRange,
    limits: &Limits,
    home: &Path,
) -> Result<(), FileOpsError> {
    let children = read_children(path).await?;
    let len = children.len();
    let (start, end) = match range {
        ByteRange::Whole => (0, len.min(limits.max_dir_size)),
        ByteRange::Span { start, end } => (start as usize, (end as usize).min(len)),
    };
    if start >= len && !range.is_whole() {
        return Ok(());
    }

    let batch_size = limits.dir_chunk_size.max(1);
    let mut batch: Vec<EntryInfo> = Vec::with_capacity(batch_size);
    if let Some(parent_info) = parent_entry(path, home).await {
        batch.push(parent_info);
    }

    for child in children.iter().take(end).skip(start) {
        if tx.is_cancelled() {
            return Err(FileOpsError::Cancelled);
        }
        let metadata = match tokio::fs::symlink_metadata(child).await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %child.display(), error = %e, "skipping vanished entry");
                continue;
            }
        };
        batch.push(crate::stat::entry_info(child, &metadata, home));
        if batch.len() >= batch_size {
            tx.send(FileData {
                entries: std::mem::take(&mut batch),
                ..Default::default()
            })
            .await?;
        }
    }
    if !batch.is_empty() {
        tx.send(FileData {
            entries: batch,
            ..Default::default()
        })
        .await?;
    }
    Ok(())
}

/// The synthesized `..` entry for `path`. Omitted for the root and when the
/// parent cannot be read.
async fn parent_entry(path: &Path, home: &Path) -> Option<EntryInfo> {
    let parent = path.parent()?;
    match stat_path(parent, home, false).await {
        Ok(mut info) => {
            info.name = "..".to_string();
            info.size = -1;
            Some(info)
        }
        Err(e) => {
            warn!(path = %parent.display(), error = %e, "omitting parent entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(home: &Path, path: &str, range: &str, limits: Limits) -> Vec<FileData> {
        stream_file(
            CancellationToken::new(),
            path.to_string(),
            range.to_string(),
            limits,
            home.to_path_buf(),
        )
        .collect_all()
        .await
        .unwrap()
    }

    fn bytes(items: &[FileData]) -> Vec<u8> {
        items.iter().flat_map(|d| d.data.iter().copied()).collect()
    }

    #[tokio::test]
    async fn whole_file_in_chunks() {
        let home = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        std::fs::write(home.path().join("blob.bin"), &data).unwrap();

        let limits = Limits {
            file_chunk_size: 4096,
            ..Limits::default()
        };
        let items = collect(home.path(), "~/blob.bin", "", limits).await;

        let info = items[0].info.as_ref().unwrap();
        assert_eq!(info.size, 10_000);
        assert_eq!(info.path, "~/blob.bin");
        assert_eq!(items.len(), 4);
        let offsets: Vec<i64> = items[1..].iter().map(|d| d.at.unwrap().offset).collect();
        assert_eq!(offsets, vec![0, 4096, 8192]);
        assert_eq!(bytes(&items), data);
    }

    #[tokio::test]
    async fn byte_range_is_end_exclusive() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("abc.txt"), b"0123456789").unwrap();

        let items = collect(home.path(), "~/abc.txt", "2-5", Limits::default()).await;
        assert_eq!(bytes(&items), b"234");
        assert_eq!(items[1].at, Some(FileDataAt { offset: 2, size: 3 }));
    }

    #[tokio::test]
    async fn range_past_end_is_empty() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("abc.txt"), b"0123456789").unwrap();

        let items = collect(home.path(), "~/abc.txt", "100-200", Limits::default()).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].info.is_some());
    }

    #[tokio::test]
    async fn missing_file_yields_info_only() {
        let home = tempfile::tempdir().unwrap();
        let items = collect(home.path(), "~/ghost.txt", "", Limits::default()).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].info.as_ref().unwrap().not_found);
    }

    #[tokio::test]
    async fn too_large_file_is_refused_after_info() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("big.bin"), vec![0u8; 100]).unwrap();
        let limits = Limits {
            max_file_size: 10,
            ..Limits::default()
        };

        let mut rx = stream_file(
            CancellationToken::new(),
            "~/big.bin".into(),
            String::new(),
            limits,
            home.path().to_path_buf(),
        );
        assert!(rx.recv().await.unwrap().unwrap().info.is_some());
        let err = rx.recv().await.unwrap().unwrap_err();
        assert!(err.message.contains("too large"), "{}", err.message);
        assert!(err.message.contains("stream_archive"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn malformed_range_is_error() {
        let home = tempfile::tempdir().unwrap();
        let err = stream_file(
            CancellationToken::new(),
            "~".into(),
            "abc".into(),
            Limits::default(),
            home.path().to_path_buf(),
        )
        .collect_all()
        .await
        .unwrap_err();
        assert!(err.message.contains("invalid byte range"));
    }

    #[tokio::test]
    async fn directory_lists_parent_then_children() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("music");
        std::fs::create_dir(&dir).unwrap();
        for name in ["b.mp3", "a.mp3", "c.mp3"] {
            std::fs::write(dir.join(name), "x").unwrap();
        }
        let limits = Limits {
            dir_chunk_size: 2,
            ..Limits::default()
        };

        let items = collect(home.path(), "~/music", "", limits).await;
        assert!(items[0].info.as_ref().unwrap().is_dir);
        let entries: Vec<&EntryInfo> = items[1..].iter().flat_map(|d| &d.entries).collect();
        assert_eq!(items.len(), 3);
        assert_eq!(entries[0].name, "..");
        assert_eq!(entries[0].size, -1);
        assert_eq!(entries[0].path, "~");
        let names: Vec<&str> = entries[1..].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.mp3", "b.mp3", "c.mp3"]);
    }

    #[tokio::test]
    async fn directory_range_selects_entries() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("d");
        std::fs::create_dir(&dir).unwrap();
        for name in ["1", "2", "3", "4"] {
            std::fs::write(dir.join(name), "x").unwrap();
        }

        let items = collect(home.path(), "~/d", "1-3", Limits::default()).await;
        let names: Vec<&str> = items[1..]
            .iter()
            .flat_map(|d| &d.entries)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["..", "2", "3"]);

        let items = collect(home.path(), "~/d", "10-20", Limits::default()).await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let err = stream_file(
            CancellationToken::new(),
            "~/../etc/passwd".into(),
            String::new(),
            Limits::default(),
            home.path().to_path_buf(),
        )
        .collect_all()
        .await
        .unwrap_err();
        assert!(err.message.contains("path traversal"));
    }

    #[tokio::test]
    async fn unreadable_parent_is_omitted() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("plain.txt"), "x").unwrap();

        // The parent resolves through a regular file, so stat fails with
        // something other than "not found".
        let dir = home.path().join("plain.txt/sub/dir");
        assert!(parent_entry(&dir, home.path()).await.is_none());

        let music = home.path().join("music");
        let parent = parent_entry(&music, home.path()).await.unwrap();
        assert_eq!(parent.name, "..");
        assert_eq!(parent.path, "~");
        assert!(parent_entry(Path::new("/"), home.path()).await.is_none());
    }
}
