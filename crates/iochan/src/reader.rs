//! Streams an async reader into a packet channel.

use remotefs_protocol::Packet;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::channel::{StreamReceiver, StreamSender, stream_channel};

/// How the pump loop ended.
enum Outcome {
    Eof(Vec<u8>),
    ReadError(std::io::Error),
    Stopped,
}

/// Spawns a task that reads `reader` in `chunk_size` pieces and sends each
/// non-empty read as a data packet.
///
/// On clean end of input the SHA-256 of everything sent follows as the
/// checksum packet. A read error becomes the terminal error packet. When
/// `cancel` fires the task stops without any terminal packet, so consumers
/// see a closed channel without a checksum.
///
/// On every exit path the reader is dropped and `cleanup` runs before the
/// terminal packet is queued and the channel closes.
pub fn reader_chan<R, F>(
    cancel: CancellationToken,
    reader: R,
    chunk_size: usize,
    capacity: usize,
    cleanup: F,
) -> StreamReceiver<Packet>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = stream_channel(capacity, cancel);
    tokio::spawn(async move {
        let mut reader = reader;
        let outcome = pump(&tx, &mut reader, chunk_size.max(1)).await;
        drop(reader);
        cleanup();

        match outcome {
            Outcome::Eof(checksum) => {
                let _ = tx.finish(checksum).await;
            }
            Outcome::ReadError(e) => {
                let _ = tx.send_error(format!("read error: {e}")).await;
            }
            Outcome::Stopped => debug!("reader_chan stopped before end of input"),
        }
    });
    rx
}

async fn pump<R>(tx: &StreamSender<Packet>, reader: &mut R, chunk_size: usize) -> Outcome
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size];
    loop {
        let read = tokio::select! {
            biased;
            _ = tx.cancel_token().cancelled() => return Outcome::Stopped,
            read = reader.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => return Outcome::Eof(hasher.finalize().to_vec()),
            Ok(n) => n,
            Err(e) => return Outcome::ReadError(e),
        };
        hasher.update(&buf[..n]);
        if tx.send_data(buf[..n].to_vec()).await.is_err() {
            return Outcome::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};

    use remotefs_protocol::RemoteError;
    use tokio::io::ReadBuf;

    fn flag() -> (Arc<AtomicBool>, impl FnOnce() + Send + 'static) {
        let flag = Arc::new(AtomicBool::new(false));
        let set = Arc::clone(&flag);
        (flag, move || set.store(true, Ordering::SeqCst))
    }

    /// Yields `good` bytes, then fails.
    struct FailingReader {
        good: Vec<u8>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.good.is_empty() {
                return Poll::Ready(Err(io::Error::other("disk on fire")));
            }
            let good = std::mem::take(&mut self.good);
            buf.put_slice(&good);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn chunks_then_checksum() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let (cleaned, cleanup) = flag();
        let reader = std::io::Cursor::new(data.clone());
        let rx = reader_chan(CancellationToken::new(), reader, 4096, 4, cleanup);

        let packets = rx.collect_all().await.unwrap();
        assert_eq!(packets.len(), 4);
        let sizes: Vec<usize> = packets
            .iter()
            .filter_map(|p| match p {
                Packet::Data(d) => Some(d.len()),
                Packet::Checksum(_) => None,
            })
            .collect();
        assert_eq!(sizes, vec![4096, 4096, 1808]);
        assert_eq!(
            packets.last(),
            Some(&Packet::Checksum(Sha256::digest(&data).to_vec()))
        );
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_input_sends_only_checksum() {
        let (_, cleanup) = flag();
        let rx = reader_chan(CancellationToken::new(), tokio::io::empty(), 16, 4, cleanup);
        let packets = rx.collect_all().await.unwrap();
        assert_eq!(packets, vec![Packet::Checksum(Sha256::digest(b"").to_vec())]);
    }

    #[tokio::test]
    async fn read_error_is_terminal() {
        let (cleaned, cleanup) = flag();
        let reader = FailingReader {
            good: b"partial".to_vec(),
        };
        let mut rx = reader_chan(CancellationToken::new(), reader, 64, 4, cleanup);

        assert_eq!(rx.recv().await, Some(Ok(Packet::Data(b"partial".to_vec()))));
        let err: RemoteError = rx.recv().await.unwrap().unwrap_err();
        assert!(err.message.contains("disk on fire"));
        assert!(rx.recv().await.is_none());
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_mid_stream_sends_no_terminal() {
        let cancel = CancellationToken::new();
        let (cleaned, cleanup) = flag();
        // Never ends on its own.
        let reader = tokio::io::repeat(0xAB);
        let mut rx = reader_chan(cancel.clone(), reader, 1024, 2, cleanup);

        let first = rx.recv().await.unwrap().unwrap();
        assert!(matches!(first, Packet::Data(ref d) if d.len() == 1024));
        cancel.cancel();

        while let Some(item) = rx.recv().await {
            assert!(matches!(item, Ok(Packet::Data(_))), "terminal after cancel");
        }
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn file_handle_released_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![7u8; 256 * 1024]).unwrap();

        let cancel = CancellationToken::new();
        let (cleaned, cleanup) = flag();
        let file = tokio::fs::File::open(&path).await.unwrap();
        let mut rx = reader_chan(cancel.clone(), file, 1024, 1, cleanup);

        assert!(rx.recv().await.unwrap().is_ok());
        cancel.cancel();
        while rx.recv().await.is_some() {}

        assert!(cleaned.load(Ordering::SeqCst));
    }
}
