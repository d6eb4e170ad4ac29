//! Path normalization and home-directory handling.
//!
//! Paths arrive from clients as strings that may start with `~`. They are
//! expanded against an injected home directory (so tests never depend on
//! `$HOME`) and cleaned lexically; the display form compresses the home
//! prefix back to `~`.

use std::path::{Component, Path, PathBuf};

use crate::FileOpsError;

/// Expands a leading `~` and cleans the result.
///
/// A `~/...` path that cleans to somewhere outside `home` is rejected as a
/// traversal attempt. Paths without `~` are only cleaned.
pub fn expand_home(path: &str, home: &Path) -> Result<PathBuf, FileOpsError> {
    if path == "~" {
        return Ok(clean_path(home));
    }
    let Some(rest) = path.strip_prefix("~/") else {
        return Ok(clean_path(Path::new(path)));
    };

    let home = clean_path(home);
    let expanded = clean_path(&home.join(rest));
    if !expanded.starts_with(&home) {
        return Err(FileOpsError::Traversal(path.to_string()));
    }
    Ok(expanded)
}

/// Lexically normalizes `path`: drops `.` components, folds `..` into the
/// preceding component, and never climbs above the root of an absolute path.
///
/// The filesystem is not consulted, so symlinks are not resolved. An empty
/// result becomes `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Display form of `path`: the home prefix is replaced with `~`.
pub fn replace_home(path: &Path, home: &Path) -> String {
    let home = clean_path(home);
    if path == home {
        return "~".to_string();
    }
    match path.strip_prefix(&home) {
        Ok(rest) if home != Path::new("/") => format!("~/{}", rest.to_string_lossy()),
        _ => path.to_string_lossy().into_owned(),
    }
}

/// The directory part of an entry: the path itself for directories and
/// the root, the parent for everything else.
pub(crate) fn dir_part(path: &Path, is_dir: bool) -> PathBuf {
    if is_dir {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        Some(_) => PathBuf::from("."),
        None => path.to_path_buf(),
    }
}

/// Resolves the segments of a `join` request to one clean path.
///
/// The first segment is home-expanded. Each following segment is joined
/// onto the result, unless it is absolute (after expansion) in which case
/// it replaces it. No segments resolve to the home directory.
pub fn resolve_joined(segments: &[String], home: &Path) -> Result<PathBuf, FileOpsError> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(clean_path(home));
    };
    let mut resolved = expand_home(first, home)?;
    for segment in rest {
        let next = expand_home(segment, home)?;
        if next.is_absolute() {
            resolved = next;
        } else {
            resolved.push(next);
        }
    }
    Ok(clean_path(&resolved))
}
