//! Tunable size limits.

use serde::{Deserialize, Serialize};

/// Size limits and buffer depths used by every streaming operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    /// Largest file `stream_file` serves.
    pub max_file_size: i64,
    /// Maximum number of entries in one directory listing.
    pub max_dir_size: usize,
    /// Bytes per streamed data chunk.
    pub file_chunk_size: usize,
    /// Entries per directory batch.
    pub dir_chunk_size: usize,
    /// Queue depth for entry/file-data streams.
    pub stream_capacity: usize,
    /// Queue depth for checksummed packet streams.
    pub packet_capacity: usize,
    /// Buffer size of the in-process pipe used by archive copies.
    pub pipe_buffer_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: remotefs_protocol::MAX_FILE_SIZE,
            max_dir_size: remotefs_protocol::MAX_DIR_SIZE,
            file_chunk_size: remotefs_protocol::FILE_CHUNK_SIZE,
            dir_chunk_size: remotefs_protocol::DIR_CHUNK_SIZE,
            stream_capacity: remotefs_iochan::STREAM_CHANNEL_CAPACITY,
            packet_capacity: remotefs_iochan::PACKET_CHANNEL_CAPACITY,
            pipe_buffer_size: 64 * 1024,
        }
    }
}
