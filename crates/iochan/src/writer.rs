//! Drains a packet channel into an async writer with checksum verification.

use remotefs_protocol::Packet;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::channel::StreamReceiver;
use crate::error::IoChanError;

/// Writes every data packet from `rx` into `writer` while recomputing the
/// SHA-256, then compares it with the terminal checksum.
///
/// Returns the number of bytes written. The writer is shut down after a
/// verified stream, so a pipe reader on the other side sees end of input.
/// Whatever the outcome, remaining queued packets are drained so the
/// producer is never left blocked, and the writer is dropped before return.
///
/// A stream that closes without a checksum fails with
/// [`IoChanError::Truncated`]; a digest disagreement fails with
/// [`IoChanError::ChecksumMismatch`] even though the bytes were written.
pub async fn write_chan<W>(
    cancel: CancellationToken,
    mut writer: W,
    mut rx: StreamReceiver<Packet>,
) -> Result<u64, IoChanError>
where
    W: AsyncWrite + Unpin,
{
    let result = copy_verified(&cancel, &mut writer, &mut rx).await;
    let discarded = rx.drain();
    if discarded > 0 {
        debug!(discarded, "write_chan drained unread packets");
    }

    let written = result?;
    writer.shutdown().await.map_err(IoChanError::Write)?;
    Ok(written)
}

async fn copy_verified<W>(
    cancel: &CancellationToken,
    writer: &mut W,
    rx: &mut StreamReceiver<Packet>,
) -> Result<u64, IoChanError>
where
    W: AsyncWrite + Unpin,
{
    let mut hasher = Sha256::new();
    let mut written: u64 = 0;
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IoChanError::Cancelled),
            item = rx.recv() => item,
        };
        match item {
            None => return Err(IoChanError::Truncated),
            Some(Err(e)) => return Err(IoChanError::Remote(e)),
            Some(Ok(Packet::Data(data))) => {
                hasher.update(&data);
                writer.write_all(&data).await.map_err(IoChanError::Write)?;
                written += data.len() as u64;
            }
            Some(Ok(Packet::Checksum(expected))) => {
                let local = hasher.finalize_reset();
                if local.as_slice() != expected.as_slice() {
                    return Err(IoChanError::ChecksumMismatch);
                }
                return Ok(written);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::stream_channel;
    use crate::reader::reader_chan;
    use crate::{PACKET_CHANNEL_CAPACITY, error_stream};

    use std::io::Cursor;

    async fn roundtrip(data: Vec<u8>, chunk_size: usize) -> Vec<u8> {
        let cancel = CancellationToken::new();
        let rx = reader_chan(
            cancel.clone(),
            Cursor::new(data),
            chunk_size,
            PACKET_CHANNEL_CAPACITY,
            || {},
        );
        let mut out = Vec::new();
        write_chan(cancel, &mut out, rx).await.unwrap();
        out
    }

    #[tokio::test]
    async fn roundtrip_empty() {
        assert!(roundtrip(Vec::new(), 64).await.is_empty());
    }

    #[tokio::test]
    async fn roundtrip_single_chunk() {
        let data = b"The quick brown fox jumps over the lazy dog".to_vec();
        assert_eq!(roundtrip(data.clone(), 64).await, data);
    }

    #[tokio::test]
    async fn roundtrip_many_chunks() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i * 31 % 251) as u8).collect();
        // 50_000 / 1024 -> 49 chunks.
        assert_eq!(roundtrip(data.clone(), 1024).await, data);
    }

    #[tokio::test]
    async fn roundtrip_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let data = vec![0x5Au8; 100_000];

        let cancel = CancellationToken::new();
        let rx = reader_chan(cancel.clone(), Cursor::new(data.clone()), 4096, 4, || {});
        let file = tokio::fs::File::create(&path).await.unwrap();
        let written = write_chan(cancel, file, rx).await.unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[tokio::test]
    async fn altered_chunk_fails_verification() {
        let cancel = CancellationToken::new();
        let data: Vec<u8> = (0..20_000u32).map(|i| i as u8).collect();
        let mut upstream = reader_chan(cancel.clone(), Cursor::new(data), 1000, 4, || {});

        // Flip one byte of the third chunk in transit.
        let (tx, rx) = stream_channel(4, cancel.clone());
        tokio::spawn(async move {
            let mut index = 0;
            while let Some(item) = upstream.recv().await {
                let packet = match item.unwrap() {
                    Packet::Data(mut d) => {
                        if index == 2 {
                            d[0] ^= 0xFF;
                        }
                        index += 1;
                        Packet::Data(d)
                    }
                    Packet::Checksum(c) => {
                        tx.finish(c).await.unwrap();
                        return;
                    }
                };
                tx.send(packet).await.unwrap();
            }
        });

        let mut out = Vec::new();
        let result = write_chan(cancel, &mut out, rx).await;
        assert!(matches!(result, Err(IoChanError::ChecksumMismatch)));
        // The bytes were written; they are suspect, not missing.
        assert_eq!(out.len(), 20_000);
    }

    #[tokio::test]
    async fn remote_error_is_surfaced_verbatim() {
        let mut out = Vec::new();
        let rx = error_stream::<Packet>("cannot open file \"/x\"");
        let result = write_chan(CancellationToken::new(), &mut out, rx).await;
        match result {
            Err(IoChanError::Remote(e)) => assert_eq!(e.message, "cannot open file \"/x\""),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_without_checksum_is_truncated() {
        let (tx, rx) = stream_channel(4, CancellationToken::new());
        tx.send_data(b"half".to_vec()).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        let result = write_chan(CancellationToken::new(), &mut out, rx).await;
        assert!(matches!(result, Err(IoChanError::Truncated)));
    }

    #[tokio::test]
    async fn cancelled_writer_drains_producer() {
        let cancel = CancellationToken::new();
        let (tx, rx) = stream_channel(2, cancel.clone());
        let producer = tokio::spawn(async move {
            let mut sent = 0usize;
            while tx.send_data(vec![0u8; 8]).await.is_ok() {
                sent += 1;
            }
            sent
        });

        cancel.cancel();
        let mut out = Vec::new();
        let result = write_chan(cancel, &mut out, rx).await;
        assert!(matches!(result, Err(IoChanError::Cancelled)));
        // The producer stops instead of blocking forever.
        producer.await.unwrap();
    }
}
