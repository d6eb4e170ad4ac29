//! Entry metadata.

use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use rand::Rng;
use remotefs_protocol::EntryInfo;
use tracing::debug;

use crate::FileOpsError;
use crate::paths::{dir_part, replace_home};

/// MIME type reported for directories.
pub const DIRECTORY_MIME_TYPE: &str = "directory";

/// Prefix of the throwaway file used to probe directory writability.
const PROBE_PREFIX: &str = "remotefs-tmp-";

/// Returns metadata for an already expanded `path`.
///
/// A missing path is not an error: the result is a stub with `not_found`
/// set, `supports_mkdir` set, and `read_only` taken from the parent
/// directory. With `extended` the `read_only` flag is probed on existing
/// entries too.
pub async fn stat_path(path: &Path, home: &Path, extended: bool) -> Result<EntryInfo, FileOpsError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let read_only = match path.parent() {
                Some(parent) => !dir_writable(parent).await,
                None => true,
            };
            return Ok(EntryInfo {
                path: replace_home(path, home),
                dir: replace_home(&dir_part(path, false), home),
                name: file_name(path),
                not_found: true,
                read_only,
                supports_mkdir: true,
                ..Default::default()
            });
        }
        Err(e) => {
            return Err(FileOpsError::io(
                format!("cannot stat file {:?}", path.display().to_string()),
                e,
            ));
        }
    };

    let mut info = entry_info(path, &metadata, home);
    if extended {
        info.read_only = probe_read_only(path, &metadata).await;
    }
    Ok(info)
}

/// Builds an [`EntryInfo`] from metadata already at hand.
pub fn entry_info(path: &Path, metadata: &Metadata, home: &Path) -> EntryInfo {
    let is_dir = metadata.is_dir();
    let mode = file_mode(metadata);
    EntryInfo {
        path: replace_home(path, home),
        dir: replace_home(&dir_part(path, is_dir), home),
        name: file_name(path),
        size: if is_dir { -1 } else { metadata.len() as i64 },
        mode,
        mode_str: mode_string(mode, is_dir),
        mod_time: metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0),
        is_dir,
        mime_type: mime_type(path, is_dir),
        supports_mkdir: true,
        ..Default::default()
    }
}

fn file_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

fn mime_type(path: &Path, is_dir: bool) -> String {
    if is_dir {
        return DIRECTORY_MIME_TYPE.to_string();
    }
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, false) => 0o755,
        (true, true) => 0o555,
        (false, false) => 0o644,
        (false, true) => 0o444,
    }
}

/// Renders permission bits the way `ls -l` does, e.g. `drwxr-xr-x`.
pub fn mode_string(mode: u32, is_dir: bool) -> String {
    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });

    // (read, write, exec, special bit, special char when exec set)
    let triplets = [
        (0o400, 0o200, 0o100, 0o4000, 's'),
        (0o040, 0o020, 0o010, 0o2000, 's'),
        (0o004, 0o002, 0o001, 0o1000, 't'),
    ];
    for (r, w, x, special, letter) in triplets {
        out.push(if mode & r != 0 { 'r' } else { '-' });
        out.push(if mode & w != 0 { 'w' } else { '-' });
        let exec = mode & x != 0;
        out.push(match (mode & special != 0, exec) {
            (true, true) => letter,
            (true, false) => letter.to_ascii_uppercase(),
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    out
}

/// Files are read-only when they cannot be opened for append. Directories
/// are judged by whether a file can be created next to them.
async fn probe_read_only(path: &Path, metadata: &Metadata) -> bool {
    if metadata.is_dir() {
        return match path.parent() {
            Some(parent) => !dir_writable(parent).await,
            None => !dir_writable(path).await,
        };
    }
    tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .is_err()
}

/// Creates and removes a uniquely named file inside `dir`.
async fn dir_writable(dir: &Path) -> bool {
    let mut suffix = [0u8; 12];
    rand::thread_rng().fill(&mut suffix);
    let probe = dir.join(format!("{PROBE_PREFIX}{}", hex::encode(suffix)));

    let created = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .await;
    match created {
        Ok(file) => {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&probe).await {
                debug!(path = %probe.display(), error = %e, "failed to remove probe file");
            }
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings() {
        assert_eq!(mode_string(0o755, true), "drwxr-xr-x");
        assert_eq!(mode_string(0o644, false), "-rw-r--r--");
        assert_eq!(mode_string(0o4755, false), "-rwsr-xr-x");
        assert_eq!(mode_string(0o1777, true), "drwxrwxrwt");
        assert_eq!(mode_string(0o2644, false), "-rw-r-Sr--");
        assert_eq!(mode_string(0, false), "----------");
    }

    #[tokio::test]
    async fn stat_existing_file() {
        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let info = stat_path(&path, home.path(), true).await.unwrap();
        assert_eq!(info.path, "~/notes.txt");
        assert_eq!(info.dir, "~");
        assert_eq!(info.name, "notes.txt");
        assert_eq!(info.size, 5);
        assert_eq!(info.mime_type, "text/plain");
        assert!(!info.is_dir);
        assert!(!info.not_found);
        assert!(!info.read_only);
        assert!(info.mod_time > 0);
    }

    #[tokio::test]
    async fn stat_directory() {
        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("docs");
        std::fs::create_dir(&path).unwrap();

        let info = stat_path(&path, home.path(), false).await.unwrap();
        assert!(info.is_dir);
        assert_eq!(info.size, -1);
        assert_eq!(info.dir, "~/docs");
        assert_eq!(info.mime_type, DIRECTORY_MIME_TYPE);
        assert!(info.mode_str.starts_with('d'));
    }

    #[tokio::test]
    async fn stat_missing_path_is_stub() {
        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("missing.txt");

        let info = stat_path(&path, home.path(), true).await.unwrap();
        assert!(info.not_found);
        assert!(info.supports_mkdir);
        assert!(!info.read_only);
        assert_eq!(info.path, "~/missing.txt");
        assert_eq!(info.dir, "~");
        assert_eq!(info.size, 0);
    }

    #[tokio::test]
    async fn probe_leaves_no_files_behind() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("d");
        std::fs::create_dir(&dir).unwrap();

        stat_path(&dir.join("nothing"), home.path(), true).await.unwrap();
        stat_path(&dir, home.path(), true).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(home.path())
            .unwrap()
            .chain(std::fs::read_dir(&dir).unwrap())
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(PROBE_PREFIX))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn read_only_file_detected() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempfile::tempdir().unwrap();
        let path = home.path().join("locked.txt");
        std::fs::write(&path, "x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o444)).unwrap();

        // Root ignores permission bits.
        let can_append = std::fs::OpenOptions::new().append(true).open(&path).is_ok();
        let info = stat_path(&path, home.path(), true).await.unwrap();
        assert_eq!(info.read_only, !can_append);
        assert_eq!(info.mode, 0o444);
        assert_eq!(info.mode_str, "-r--r--r--");
    }
}
