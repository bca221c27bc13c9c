//! # Duplex Pipe
//!
//! Wraps any `AsyncRead + AsyncWrite` stream in two independent pumps.
//!
//! - The **inbound pump** reads chunks from the socket into a bounded queue.
//!   `read_bytes(n)` waits only while fewer than `n` bytes are cached and
//!   hands out exactly `n` bytes, releasing them from the cache.
//! - The **outbound pump** drains a bounded queue of writes, coalesces
//!   whatever is already queued, flushes and then acknowledges each write.
//!   `write` resolves only after its bytes were flushed, and a full queue
//!   makes the caller wait for the peer instead of buffering without bound.
//!
//! ## Shutdown Ordering
//! `close` stops accepting writes, waits for the outbound pump to flush and
//! shut down the write half, and only then stops the inbound pump.

use crate::config::TransportConfig;
use crate::core::reader::WireRead;
use crate::error::{constants, ProtocolError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn};

struct OutboundWrite {
    data: Bytes,
    ack: oneshot::Sender<io::Result<()>>,
}

pub struct DuplexPipe {
    inbound: mpsc::Receiver<io::Result<Bytes>>,
    cached: BytesMut,
    outbound: Option<mpsc::Sender<OutboundWrite>>,
    reader_task: JoinHandle<()>,
    writer_task: Option<JoinHandle<io::Result<()>>>,
    close_timeout: Duration,
    peer: String,
}

impl DuplexPipe {
    /// Split `stream` and start both pumps on the current runtime.
    pub fn new<S>(stream: S, config: &TransportConfig, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (in_tx, in_rx) = mpsc::channel(config.inbound_queue_depth.max(1));
        let (out_tx, out_rx) = mpsc::channel(config.outbound_queue_depth.max(1));
        let peer = peer.into();

        let reader_task = tokio::spawn(pump_inbound(read_half, in_tx, config.read_chunk_size.max(64)));
        let writer_task = tokio::spawn(pump_outbound(write_half, out_rx));

        debug!(peer = %peer, "Duplex pipe started");

        Self {
            inbound: in_rx,
            cached: BytesMut::new(),
            outbound: Some(out_tx),
            reader_task,
            writer_task: Some(writer_task),
            close_timeout: config.close_timeout,
            peer,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether the outbound side still accepts writes
    pub fn is_open(&self) -> bool {
        self.outbound.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Queue a copy of `data` and wait until the outbound pump has flushed it.
    /// Pooled frames should go through [`write_bytes`](Self::write_bytes).
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.write_bytes(Bytes::copy_from_slice(data)).await
    }

    /// Queue `data` without copying and wait until it has been flushed.
    pub async fn write_bytes(&mut self, data: Bytes) -> Result<()> {
        let sender = self
            .outbound
            .as_ref()
            .ok_or(ProtocolError::ConnectionClosed)?;
        let (ack, done) = oneshot::channel();
        sender
            .send(OutboundWrite { data, ack })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        match done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProtocolError::Io(e)),
            Err(_) => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Bytes received but not yet consumed
    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    /// Flush queued writes, shut down the write half, then stop reading.
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub async fn close(mut self) -> Result<()> {
        self.outbound.take();
        let result = match self.writer_task.take() {
            Some(task) => match tokio::time::timeout(self.close_timeout, task).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => Err(ProtocolError::Io(e)),
                Ok(Err(join_err)) => Err(ProtocolError::Io(io::Error::other(join_err.to_string()))),
                Err(_) => {
                    warn!(timeout_ms = self.close_timeout.as_millis() as u64, "Outbound pump did not drain in time");
                    Err(ProtocolError::Timeout)
                }
            },
            None => Ok(()),
        };
        self.reader_task.abort();
        debug!("Duplex pipe closed");
        result
    }
}

impl Drop for DuplexPipe {
    fn drop(&mut self) {
        // The writer drains on its own once the sender is gone.
        self.reader_task.abort();
    }
}

#[async_trait]
impl WireRead for DuplexPipe {
    async fn read_bytes(&mut self, count: usize) -> Result<Bytes> {
        while self.cached.len() < count {
            match self.inbound.recv().await {
                Some(Ok(chunk)) => {
                    trace!(bytes = chunk.len(), "Inbound chunk");
                    self.cached.extend_from_slice(&chunk);
                }
                Some(Err(e)) => return Err(ProtocolError::Io(e)),
                None if self.cached.is_empty() => return Err(ProtocolError::ConnectionClosed),
                None => return Err(ProtocolError::malformed(constants::ERR_TRUNCATED)),
            }
        }
        Ok(self.cached.split_to(count).freeze())
    }
}

async fn pump_inbound<R>(mut reader: R, tx: mpsc::Sender<io::Result<Bytes>>, chunk_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(chunk_size);
    loop {
        buf.reserve(chunk_size);
        match reader.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(Ok(buf.split().freeze())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
    trace!("Inbound pump finished");
}

async fn pump_outbound<W>(mut writer: W, mut rx: mpsc::Receiver<OutboundWrite>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(first) = rx.recv().await {
        let mut acks = vec![first.ack];
        let mut result = writer.write_all(&first.data).await;

        while result.is_ok() {
            match rx.try_recv() {
                Ok(next) => {
                    acks.push(next.ack);
                    result = writer.write_all(&next.data).await;
                }
                Err(_) => break,
            }
        }

        if result.is_ok() {
            result = writer.flush().await;
        }

        match result {
            Ok(()) => {
                for ack in acks {
                    let _ = ack.send(Ok(()));
                }
            }
            Err(e) => {
                for ack in acks {
                    let _ = ack.send(Err(io::Error::new(e.kind(), e.to_string())));
                }
                return Err(e);
            }
        }
    }
    writer.shutdown().await
}
