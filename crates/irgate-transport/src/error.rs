use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur on a gateway connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the local side of the socket to the configured interface.
    #[error("failed to bind to local interface {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the gateway.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The connect attempt did not complete in time.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    /// The local interface and the gateway address use different IP families.
    #[error("local interface {local} cannot reach {remote} (address family mismatch)")]
    AddressFamily { local: SocketAddr, remote: SocketAddr },

    /// An I/O error occurred on an open connection.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The gateway closed the connection.
    #[error("connection closed by device")]
    Closed,

    /// No reply arrived in time.
    #[error("no reply from device after {0:?}")]
    ReplyTimeout(Duration),

    /// The reply line exceeded the length limit without a terminator.
    #[error("reply exceeds {0} bytes without a line terminator")]
    ReplyTooLong(usize),

    /// The connection is not open.
    #[error("{0} connection is not open")]
    NotConnected(String),
}

impl TransportError {
    /// True if the failure happened while binding the configured local interface.
    pub fn is_bind_failure(&self) -> bool {
        matches!(self, Self::Bind { .. } | Self::AddressFamily { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
