//! Conflict resolution for archive copies.
//!
//! Every entry extracted from an archive is matched against what already
//! exists at its destination. The outcome depends only on the two kinds
//! and the copy options:
//!
//! | destination | entry | options            | action            |
//! |-------------|-------|--------------------|-------------------|
//! | missing     | dir   |                    | create dir        |
//! | missing     | file  |                    | create file       |
//! | dir         | dir   | overwrite          | replace with dir  |
//! | dir         | dir   | merge              | merge             |
//! | dir         | dir   | neither            | conflict          |
//! | dir         | file  | overwrite          | replace with file |
//! | dir         | file  | no overwrite       | conflict          |
//! | file        | dir   | overwrite          | replace with dir  |
//! | file        | dir   | no overwrite       | conflict          |
//! | file        | file  | overwrite          | replace with file |
//! | file        | file  | no overwrite       | conflict          |

use std::fmt;
use std::path::Path;

use remotefs_protocol::CopyOptions;

use crate::FileOpsError;

/// What currently occupies a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestState {
    Missing,
    Directory,
    File,
}

impl DestState {
    /// Inspects `path`, following symlinks.
    pub fn probe(path: &Path) -> Result<Self, FileOpsError> {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => Ok(DestState::Directory),
            Ok(_) => Ok(DestState::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DestState::Missing),
            Err(e) => Err(FileOpsError::io(
                format!("cannot stat file {:?}", path.display().to_string()),
                e,
            )),
        }
    }
}

/// Kind of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// What to do with one archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyAction {
    CreateDir,
    CreateFile,
    /// Keep the existing directory and extract children into it.
    MergeDir,
    /// Remove what is there, then create a directory.
    ReplaceWithDir,
    /// Remove what is there, then write the file.
    ReplaceWithFile,
}

/// Why an entry cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    FileExists,
    DirectoryExists,
    DirectoryExistsAsFile,
    /// The copy root is an existing directory and the copy is not recursive.
    RecursiveRequired,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Conflict::FileExists => "file exists at path, overwrite not specified",
            Conflict::DirectoryExists => {
                "directory exists at path, neither overwrite nor merge specified"
            }
            Conflict::DirectoryExistsAsFile => {
                "directory exists at path as a file, overwrite not specified"
            }
            Conflict::RecursiveRequired => "destination is a directory, use recursive option",
        })
    }
}

/// Decides the action for one entry. Pure, so the full table is testable.
pub fn resolve_entry(
    dest: DestState,
    entry: EntryKind,
    opts: &CopyOptions,
) -> Result<CopyAction, Conflict> {
    match (dest, entry) {
        (DestState::Missing, EntryKind::Directory) => Ok(CopyAction::CreateDir),
        (DestState::Missing, EntryKind::File) => Ok(CopyAction::CreateFile),
        (DestState::Directory, EntryKind::Directory) => {
            if opts.overwrite {
                Ok(CopyAction::ReplaceWithDir)
            } else if opts.merge {
                Ok(CopyAction::MergeDir)
            } else {
                Err(Conflict::DirectoryExists)
            }
        }
        (DestState::Directory, EntryKind::File) if opts.overwrite => {
            Ok(CopyAction::ReplaceWithFile)
        }
        (DestState::Directory, EntryKind::File) => Err(Conflict::FileExists),
        (DestState::File, EntryKind::Directory) if opts.overwrite => {
            Ok(CopyAction::ReplaceWithDir)
        }
        (DestState::File, EntryKind::Directory) => Err(Conflict::DirectoryExistsAsFile),
        (DestState::File, EntryKind::File) if opts.overwrite => Ok(CopyAction::ReplaceWithFile),
        (DestState::File, EntryKind::File) => Err(Conflict::FileExists),
    }
}

/// Validates the copy root before any data moves.
///
/// `incoming` is the kind of the copy source when it is known up front; the
/// root is then judged exactly like any other entry. Only checks; nothing on
/// disk changes.
pub fn precheck_destination(
    dest: DestState,
    incoming: Option<EntryKind>,
    opts: &CopyOptions,
) -> Result<(), Conflict> {
    match (dest, incoming) {
        (DestState::Missing, _) => Ok(()),
        (DestState::Directory, _) if !opts.recursive => Err(Conflict::RecursiveRequired),
        (_, Some(kind)) => resolve_entry(dest, kind, opts).map(|_| ()),
        (DestState::Directory, None) if !opts.merge && !opts.overwrite => {
            Err(Conflict::DirectoryExists)
        }
        (DestState::File, None) if !opts.overwrite => Err(Conflict::FileExists),
        (_, None) => Ok(()),
    }
}
