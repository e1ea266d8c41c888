use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::tcp::connect_from;

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Longest reply line accepted on the command channel, terminator included.
pub const MAX_REPLY_LEN: usize = 4096;

/// One logical channel to a gateway (command, serial-1 or serial-2).
///
/// The destination and local interface are fixed at construction; the socket
/// and its read/write halves come and go with [`open`](Self::open) and
/// [`close`](Self::close), and may cycle many times over the connection's
/// lifetime. A present local address means both halves were created together.
pub struct DeviceConnection {
    name: String,
    remote: SocketAddr,
    local_ip: IpAddr,
    connect_timeout: Duration,
    local_addr: Option<SocketAddr>,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
}

impl DeviceConnection {
    /// Create a closed connection to `remote`, sourced from `local_ip`.
    pub fn new(name: impl Into<String>, remote: SocketAddr, local_ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            remote,
            local_ip,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            local_addr: None,
            reader: None,
            writer: None,
        }
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Channel name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gateway address this channel connects to.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Local address of the open socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// True while a socket is open.
    pub fn is_open(&self) -> bool {
        self.local_addr.is_some()
    }

    /// Open the socket. A connection that is already open is left as is.
    pub async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let stream = connect_from(self.local_ip, self.remote, self.connect_timeout).await?;
        let local_addr = stream.local_addr()?;
        let (read_half, write_half) = stream.into_split();

        self.local_addr = Some(local_addr);
        self.reader = Some(BufReader::new(read_half));
        self.writer = Some(write_half);

        info!(channel = %self.name, remote = %self.remote, %local_addr, "connection open");
        Ok(())
    }

    /// Close the socket. Safe to call on a connection that was never opened.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.shutdown().await {
                debug!(channel = %self.name, remote = %self.remote, error = %err, "error closing connection");
            }
            debug!(channel = %self.name, remote = %self.remote, "connection closed");
        }
        self.reset();
    }

    /// Forget the socket and both halves without any I/O.
    pub fn reset(&mut self) {
        self.local_addr = None;
        self.reader = None;
        self.writer = None;
    }

    /// Write `bytes` verbatim and flush.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransportError::NotConnected(self.name.clone()))?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one `\n`-terminated line, waiting at most `timeout`.
    ///
    /// The terminator is kept; callers trim as they see fit. A line longer
    /// than [`MAX_REPLY_LEN`] fails with [`TransportError::ReplyTooLong`].
    pub async fn read_line(&mut self, timeout: Duration) -> Result<String> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| TransportError::NotConnected(self.name.clone()))?;

        let mut line = Vec::with_capacity(64);
        let mut limited = (&mut *reader).take(MAX_REPLY_LEN as u64);
        let read = tokio::time::timeout(timeout, limited.read_until(b'\n', &mut line))
            .await
            .map_err(|_| TransportError::ReplyTimeout(timeout))??;
        if read == 0 {
            return Err(TransportError::Closed);
        }
        if line.last() != Some(&b'\n') {
            if line.len() >= MAX_REPLY_LEN {
                return Err(TransportError::ReplyTooLong(MAX_REPLY_LEN));
            }
            return Err(TransportError::Closed);
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Hand the read half to a dedicated reader task.
    ///
    /// The connection stays open for writing; the socket is fully closed
    /// once the taken half is dropped and [`close`](Self::close) runs.
    pub fn take_reader(&mut self) -> Option<BufReader<OwnedReadHalf>> {
        self.reader.take()
    }
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("name", &self.name)
            .field("remote", &self.remote)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
