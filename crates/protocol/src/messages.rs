use serde::{Deserialize, Serialize};

use crate::types::{CopyOptions, EntryInfo, ListEntriesOptions, base64_bytes};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Streams a file's bytes or a directory's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFileRequest {
    pub path: String,
    /// `"<start>-<end>"`, empty for the whole file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub byte_range: String,
}

/// Streams a path as a checksummed archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamArchiveRequest {
    pub path: String,
    #[serde(default)]
    pub opts: CopyOptions,
}

/// Copies `src_uri` (possibly on another endpoint) to `dest_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCopyRequest {
    pub src_uri: String,
    pub dest_path: String,
    #[serde(default)]
    pub opts: CopyOptions,
}

/// Lists a directory, single level or recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesRequest {
    pub path: String,
    #[serde(default)]
    pub opts: ListEntriesOptions,
}

/// Replaces a file's contents.
///
/// `data` is base64 in JSON. `create_mode` of zero means 0644.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileRequest {
    pub path: String,
    #[serde(rename = "data64", with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub create_mode: u32,
}

/// Renames `path` to `new_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub path: String,
    pub new_path: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// One batch of a `list_entries` stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesResponse {
    pub file_info: Vec<EntryInfo>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
