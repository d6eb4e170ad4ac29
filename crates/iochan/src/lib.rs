//! Packet channels for streaming bytes between endpoints.
//!
//! A [`StreamSender`]/[`StreamReceiver`] pair is a bounded, single-producer
//! single-consumer queue tied to a [`CancellationToken`]. Byte streams travel
//! as [`Packet`]s: data chunks followed by one terminal checksum (or error).
//!
//! - [`reader_chan`] pumps an [`AsyncRead`](tokio::io::AsyncRead) into a
//!   channel, hashing as it goes.
//! - [`write_chan`] drains a channel into an
//!   [`AsyncWrite`](tokio::io::AsyncWrite) and verifies the checksum.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken
//! [`Packet`]: remotefs_protocol::Packet

pub mod channel;
pub mod error;
pub mod reader;
pub mod writer;

pub use channel::{StreamReceiver, StreamSender, error_stream, stream_channel};
pub use error::IoChanError;
pub use reader::reader_chan;
pub use writer::write_chan;

/// Queue depth of a packet channel.
pub const PACKET_CHANNEL_CAPACITY: usize = 32;

/// Queue depth of a response stream (entry batches, file data).
pub const STREAM_CHANNEL_CAPACITY: usize = 16;
