//! Error types for packet channels.

use remotefs_protocol::RemoteError;

/// Errors produced while streaming through a packet channel.
#[derive(Debug, thiserror::Error)]
pub enum IoChanError {
    #[error("write error: {0}")]
    Write(std::io::Error),

    /// The stream completed but its bytes do not match the sender's digest.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The producer ended the stream with an error packet.
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// The channel closed with neither a checksum nor an error.
    #[error("stream ended without checksum")]
    Truncated,

    #[error("cancelled")]
    Cancelled,

    /// The other side of the channel is gone.
    #[error("channel closed")]
    Closed,
}
