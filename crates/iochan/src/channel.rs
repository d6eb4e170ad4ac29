//! Bounded, cancellable response channels.
//!
//! One producer, one consumer. The producer closes the channel by dropping
//! its [`StreamSender`]; terminal methods (`send_error`, `finish`) consume the
//! sender so nothing can follow a terminal item.

use std::fmt;

use remotefs_protocol::{Packet, RemoteError, Response};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::IoChanError;

/// Creates a bounded stream channel governed by `cancel`.
pub fn stream_channel<T>(
    capacity: usize,
    cancel: CancellationToken,
) -> (StreamSender<T>, StreamReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (StreamSender { tx, cancel }, StreamReceiver { rx })
}

/// Returns a stream that yields a single error and ends.
pub fn error_stream<T>(err: impl fmt::Display) -> StreamReceiver<T> {
    let (tx, rx) = mpsc::channel(1);
    // Capacity 1 and no other sender: this cannot fail.
    let _ = tx.try_send(Err(RemoteError::new(err.to_string())));
    StreamReceiver { rx }
}

/// Producer half of a stream channel.
pub struct StreamSender<T> {
    tx: mpsc::Sender<Response<T>>,
    cancel: CancellationToken,
}

impl<T> StreamSender<T> {
    /// Queues one item, waiting for space.
    ///
    /// Fails with [`IoChanError::Cancelled`] once the governing token is
    /// cancelled (even if space is available) and with
    /// [`IoChanError::Closed`] when the consumer is gone.
    pub async fn send(&self, item: T) -> Result<(), IoChanError> {
        self.deliver(Ok(item)).await
    }

    /// Sends the terminal error and closes the channel.
    ///
    /// Nothing is sent if the stream was already cancelled.
    pub async fn send_error(self, err: impl fmt::Display) -> Result<(), IoChanError> {
        if self.cancel.is_cancelled() {
            return Err(IoChanError::Cancelled);
        }
        self.deliver(Err(RemoteError::new(err.to_string()))).await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The token governing this stream.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn deliver(&self, item: Response<T>) -> Result<(), IoChanError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IoChanError::Cancelled),
            result = self.tx.send(item) => result.map_err(|_| IoChanError::Closed),
        }
    }
}

impl StreamSender<Packet> {
    /// Queues a data packet.
    pub async fn send_data(&self, data: Vec<u8>) -> Result<(), IoChanError> {
        self.send(Packet::Data(data)).await
    }

    /// Sends the terminal checksum and closes the channel.
    ///
    /// Nothing is sent if the stream was already cancelled.
    pub async fn finish(self, checksum: Vec<u8>) -> Result<(), IoChanError> {
        if self.cancel.is_cancelled() {
            return Err(IoChanError::Cancelled);
        }
        self.deliver(Ok(Packet::Checksum(checksum))).await
    }
}

/// Consumer half of a stream channel.
pub struct StreamReceiver<T> {
    rx: mpsc::Receiver<Response<T>>,
}

impl<T> StreamReceiver<T> {
    /// Receives the next item; `None` once the producer has closed.
    pub async fn recv(&mut self) -> Option<Response<T>> {
        self.rx.recv().await
    }

    /// Abandons the stream: refuses further items and discards queued ones
    /// without blocking, so the producer can never wait on a full queue.
    ///
    /// Returns the number of discarded items.
    pub fn drain(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Collects every item until the channel closes.
    ///
    /// Stops at the first error item and returns it.
    pub async fn collect_all(mut self) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        while let Some(item) = self.rx.recv().await {
            match item {
                Ok(value) => items.push(value),
                Err(e) => {
                    self.drain();
                    return Err(e);
                }
            }
        }
        Ok(items)
    }
}
