//! Wire protocol types for remote file access.
//!
//! Everything that crosses an endpoint boundary lives here: entry metadata,
//! streamed file data, checksummed packets, copy options and the request
//! payloads of each operation.

pub mod locator;
pub mod messages;
pub mod range;
pub mod types;

pub use locator::{LocatorError, SourceLocator};
pub use messages::{
    FileCopyRequest, ListEntriesRequest, ListEntriesResponse, RenameRequest, StreamArchiveRequest,
    StreamFileRequest, WriteFileRequest,
};
pub use range::{ByteRange, RangeError};
pub use types::{
    CopyOptions, EntryInfo, FileData, FileDataAt, ListEntriesOptions, Packet, RemoteError,
    Response,
};

/// Size of one streamed data chunk: 64 KiB.
pub const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Number of entries per directory batch.
pub const DIR_CHUNK_SIZE: usize = 128;

/// Largest file `stream_file` will serve: 50 MiB.
pub const MAX_FILE_SIZE: i64 = 50 * 1024 * 1024;

/// Maximum number of entries returned for one directory listing.
pub const MAX_DIR_SIZE: usize = 1024;

/// Endpoint name that always refers to the serving endpoint itself.
pub const LOCAL_ENDPOINT: &str = "local";
