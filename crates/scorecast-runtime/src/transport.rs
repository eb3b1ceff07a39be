//! Broker transport
//!
//! Frames travel over a byte stream, each one terminated by a single NUL
//! byte. A [`Transport`] moves whole frames: `send_frame` appends the
//! terminator, `receive_frame` blocks until one terminated frame is
//! available. Closing a transport wakes a pending `receive_frame` with an
//! error, which is how the session stops its reader.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, trace};

/// Frame terminator on the wire
pub const FRAME_TERMINATOR: u8 = b'\0';

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Transport failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid broker address {0}, expected host:port")]
    InvalidAddress(String),

    #[error("Connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Send failed: {0}")]
    Send(#[source] io::Error),

    #[error("Receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("Stream ended")]
    StreamEnded,

    #[error("Transport closed")]
    Closed,
}

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// Frame-level connection to a broker
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame; the terminator is appended here
    async fn send_frame(&self, frame: &str) -> Result<(), TransportError>;

    /// Wait for the next complete frame, without its terminator
    async fn receive_frame(&self) -> Result<String, TransportError>;

    /// Close the connection; idempotent
    async fn close(&self);
}

/// Opens transports to a broker address
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError>;
}

// ----------------------------------------------------------------------------
// Stream Transport
// ----------------------------------------------------------------------------

/// NUL-delimited frame transport over any async byte stream halves
#[derive(Debug)]
pub struct StreamTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<W>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn read_terminated(&self) -> Result<String, TransportError> {
        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();

        let read = reader
            .read_until(FRAME_TERMINATOR, &mut buf)
            .await
            .map_err(TransportError::Receive)?;

        // EOF, possibly in the middle of a frame
        if read == 0 || buf.last() != Some(&FRAME_TERMINATOR) {
            return Err(TransportError::StreamEnded);
        }
        buf.pop();

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl StreamTransport<OwnedReadHalf, OwnedWriteHalf> {
    /// Wrap a connected TCP stream
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }
}

#[async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send_frame(&self, frame: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(TransportError::Send)?;
        writer
            .write_all(&[FRAME_TERMINATOR])
            .await
            .map_err(TransportError::Send)?;
        writer.flush().await.map_err(TransportError::Send)?;

        trace!("Sent {} byte frame", frame.len() + 1);
        Ok(())
    }

    async fn receive_frame(&self) -> Result<String, TransportError> {
        // Register for the close signal before checking the flag so a
        // concurrent close cannot slip in between
        let closed = self.close_signal.notified();
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        tokio::select! {
            _ = closed => Err(TransportError::Closed),
            frame = self.read_terminated() => frame,
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.close_signal.notify_waiters();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Transport shutdown error ignored: {}", e);
        }
    }
}

// ----------------------------------------------------------------------------
// TCP Connector
// ----------------------------------------------------------------------------

/// Connects to `host:port` over TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    /// Split `host:port` into its parts
    pub fn parse_address(address: &str) -> Result<(&str, u16), TransportError> {
        let (host, port) = address
            .split_once(':')
            .ok_or_else(|| TransportError::InvalidAddress(address.to_string()))?;
        if host.is_empty() {
            return Err(TransportError::InvalidAddress(address.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| TransportError::InvalidAddress(address.to_string()))?;
        Ok((host, port))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        let (host, port) = Self::parse_address(address)?;
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| TransportError::Connect {
                address: address.to_string(),
                source,
            })?;
        debug!("Connected to {}:{}", host, port);
        Ok(Arc::new(StreamTransport::from_tcp(stream)))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
