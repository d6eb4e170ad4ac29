//! Filesystem operations behind remote file access.
//!
//! Resolves and normalizes paths, produces [`EntryInfo`] metadata, lists
//! directories in batches, streams file contents, and copies whole trees
//! through checksummed archive streams.
//!
//! [`EntryInfo`]: remotefs_protocol::EntryInfo

pub mod archive;
pub mod conflict;
mod error;
pub mod limits;
pub mod list;
pub mod ops;
pub mod paths;
pub mod stat;
pub mod stream;

pub use archive::{ArchiveSource, check_not_same_path, copy_archive, stream_archive};
pub use conflict::{Conflict, CopyAction, DestState, EntryKind, precheck_destination, resolve_entry};
pub use error::FileOpsError;
pub use limits::Limits;
pub use list::list_entries;
pub use ops::{delete_path, make_dir, rename_path, touch_file, write_file};
pub use paths::{clean_path, expand_home, replace_home, resolve_joined};
pub use stat::stat_path;
pub use stream::stream_file;

/// Returns the user's home directory.
///
/// Falls back to `/tmp` when `$HOME` is unset.
pub fn home_dir() -> std::path::PathBuf {
    std::env::var("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("/tmp"))
}
