//! Single-shot mutating operations: touch, mkdir, rename, write, delete.
//!
//! Every function takes an already expanded path.

use std::io::ErrorKind;
use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::FileOpsError;

/// Mode for files created without an explicit one.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Mode for directories created implicitly.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

fn quoted(path: &Path) -> String {
    format!("{:?}", path.display().to_string())
}

async fn exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

async fn create_parent(path: &Path) -> Result<(), FileOpsError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DEFAULT_DIR_MODE);
    builder.create(parent).await.map_err(|e| {
        FileOpsError::io(format!("cannot create directory {}", quoted(parent)), e)
    })
}

/// Creates an empty file, along with missing parent directories.
///
/// Fails if anything already exists at `path`.
pub async fn touch_file(path: &Path) -> Result<(), FileOpsError> {
    if exists(path).await {
        return Err(FileOpsError::AlreadyExists(path.display().to_string()));
    }
    create_parent(path).await?;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(DEFAULT_FILE_MODE);
    options
        .open(path)
        .await
        .map_err(|e| FileOpsError::io(format!("cannot create file {}", quoted(path)), e))?;

    info!(path = %path.display(), "created file");
    Ok(())
}

/// Creates a directory and any missing parents.
pub async fn make_dir(path: &Path) -> Result<(), FileOpsError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => {
            return Err(FileOpsError::AlreadyExists(path.display().to_string()));
        }
        Ok(_) => return Err(FileOpsError::FileInTheWay(path.display().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(FileOpsError::io(format!("cannot stat file {}", quoted(path)), e)),
    }

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DEFAULT_DIR_MODE);
    builder
        .create(path)
        .await
        .map_err(|e| FileOpsError::io(format!("cannot create directory {}", quoted(path)), e))?;

    info!(path = %path.display(), "created directory");
    Ok(())
}

/// Renames `from` to `to`. Refuses to replace an existing `to`.
pub async fn rename_path(from: &Path, to: &Path) -> Result<(), FileOpsError> {
    if exists(to).await {
        return Err(FileOpsError::AlreadyExists(to.display().to_string()));
    }
    tokio::fs::rename(from, to).await.map_err(|e| {
        FileOpsError::io(format!("cannot rename {} to {}", quoted(from), quoted(to)), e)
    })?;

    info!(from = %from.display(), to = %to.display(), "renamed");
    Ok(())
}

/// Replaces the contents of `path` with `data`.
///
/// `mode` only applies when the file is created; zero means
/// [`DEFAULT_FILE_MODE`].
pub async fn write_file(path: &Path, data: &[u8], mode: u32) -> Result<(), FileOpsError> {
    let context = || format!("cannot write file {}", quoted(path));
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(if mode == 0 { DEFAULT_FILE_MODE } else { mode & 0o7777 });
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(path)
        .await
        .map_err(|e| FileOpsError::io(context(), e))?;
    file.write_all(data)
        .await
        .map_err(|e| FileOpsError::io(context(), e))?;
    file.flush().await.map_err(|e| FileOpsError::io(context(), e))?;

    info!(path = %path.display(), bytes = data.len(), "wrote file");
    Ok(())
}

/// Removes a file or an empty directory.
pub async fn delete_path(path: &Path) -> Result<(), FileOpsError> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| FileOpsError::io(format!("cannot delete {}", quoted(path)), e))?;
    let result = if metadata.is_dir() {
        tokio::fs::remove_dir(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    result.map_err(|e| FileOpsError::io(format!("cannot delete {}", quoted(path)), e))?;

    info!(path = %path.display(), "deleted");
    Ok(())
}
