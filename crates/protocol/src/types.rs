use serde::{Deserialize, Serialize};

/// Normalized metadata for a file or directory.
///
/// `path` is the display form (home directory compressed back to `~`),
/// `size` is `-1` for directories so they never look like empty files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub path: String,
    pub dir: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub mode: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode_str: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub mod_time: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_found: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub supports_mkdir: bool,
}

/// Position of a data chunk inside the streamed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDataAt {
    pub offset: i64,
    pub size: i64,
}

/// One response of a `stream_file` call.
///
/// The first response carries `info` for the requested path. Directory
/// streams follow with `entries` batches, file streams with `data` chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<EntryInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntryInfo>,
    #[serde(
        default,
        rename = "data64",
        skip_serializing_if = "Vec::is_empty",
        with = "base64_bytes"
    )]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<FileDataAt>,
}

/// Transport unit of a checksummed byte stream.
///
/// A stream is any number of `Data` packets followed by exactly one
/// terminal: either `Checksum` (SHA-256 over all data) or an error carried
/// on the `Err` side of [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Packet {
    Data(#[serde(with = "base64_bytes")] Vec<u8>),
    Checksum(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Packet {
    /// Returns `true` for the terminal checksum packet.
    pub fn is_checksum(&self) -> bool {
        matches!(self, Packet::Checksum(_))
    }
}

/// Error delivered as the terminal item of a stream.
///
/// Errors cross endpoint boundaries as plain messages, so the concrete error
/// type of the producing side is flattened into this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A stream item: a response or the terminal error.
pub type Response<T> = Result<T, RemoteError>;

/// Options governing `stream_archive` and `copy`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    pub recursive: bool,
    pub merge: bool,
    pub overwrite: bool,
}

/// Options for `list_entries`.
///
/// `all` switches from a single-level listing to a recursive, files-only
/// walk. A `limit` of zero means the configured maximum directory size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListEntriesOptions {
    pub all: bool,
    pub offset: usize,
    pub limit: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !v
}

/// Standard base64 for byte payloads inside JSON.
pub(crate) mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
