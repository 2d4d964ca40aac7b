//! Per-connection request loop.
//!
//! Every accepted socket gets one task. The task owns the socket and a
//! growable receive buffer; it reads bytes, peels complete RESP frames
//! off the front of the buffer, dispatches each one, and writes the
//! reply before looking at the next frame. Because frames are consumed
//! strictly in order, a client that pipelines several requests in one
//! write gets its replies back in request order.
//!
//! Framing errors are answered with a simple error and then the
//! connection is closed: once the byte stream is out of sync there is no
//! safe way to find the next frame boundary. Command errors (bad arity,
//! WRONGTYPE, and so on) are ordinary replies and leave the connection
//! open.

use crate::commands::CommandHandler;
use crate::protocol::{decode, FrameError, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Initial receive buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4 * 1024;

/// Process-wide connection counters. Shared by every connection task and
/// read only for logging.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Connections accepted since startup.
    pub accepted: AtomicU64,
    /// Connections currently open.
    pub active: AtomicU64,
    /// Commands dispatched since startup.
    pub commands: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }
}

/// Why a connection task ended.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket read or write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent bytes that can never form a valid frame.
    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),

    /// The peer closed the socket between requests.
    #[error("client disconnected")]
    Disconnected,

    /// The peer closed the socket in the middle of a frame.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A reply could not be serialized; the store is untouched but this
    /// connection cannot be trusted to stay in sync.
    #[error("internal error")]
    Internal,
}

/// State for one client connection.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.opened();
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            commands,
            stats,
        }
    }

    /// Runs the connection to completion and logs how it ended.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.request_loop().await;

        match &result {
            Ok(()) | Err(ConnectionError::Disconnected) => {
                debug!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection closed"),
        }

        self.stats.closed();
        result
    }

    async fn request_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete frame already buffered before reading
            // again; this is what keeps pipelined replies in order.
            loop {
                let request = match self.next_request() {
                    Ok(Some(request)) => request,
                    Ok(None) => break,
                    Err(e) => {
                        let reply = RespValue::error(format!("ERR protocol error: {}", e));
                        self.send(&reply).await?;
                        return Err(ConnectionError::Frame(e));
                    }
                };
                let reply = self.commands.execute(request);
                self.stats.command();
                self.send(&reply).await?;
            }
            self.read_more().await?;
        }
    }

    /// Peels one complete frame off the front of the buffer.
    fn next_request(&mut self) -> Result<Option<RespValue>, FrameError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        match decode(&self.buffer)? {
            Some((request, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    async fn read_more(&mut self) -> Result<(), ConnectionError> {
        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::Disconnected);
            }
            return Err(ConnectionError::UnexpectedEof);
        }
        Ok(())
    }

    async fn send(&mut self, reply: &RespValue) -> Result<(), ConnectionError> {
        let bytes = match reply.serialize() {
            Ok(bytes) => bytes,
            Err(_) => {
                // A handler built a reply the codec refuses to frame.
                self.stream.write_all(b"-ERR internal error\r\n").await?;
                self.stream.flush().await?;
                return Err(ConnectionError::Internal);
            }
        };
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Accepts ownership of one socket and services it until the peer goes
/// away. Expected errors (disconnects, resets) are already logged at
/// debug level inside [`Connection::run`].
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    // Replies are small; get them on the wire immediately.
    let _ = stream.set_nodelay(true);
    let connection = Connection::new(stream, addr, commands, stats);
    let _ = connection.run().await;
}
