use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

use crate::error::{Result, TransportError};

/// Open a TCP stream to `remote` from an ephemeral port on `local_ip`.
///
/// An unspecified `local_ip` lets the OS pick the interface. The connect is
/// bounded by `timeout`; on any failure the half-open socket is dropped
/// (and therefore closed) before the error is returned.
pub async fn connect_from(
    local_ip: IpAddr,
    remote: SocketAddr,
    timeout: Duration,
) -> Result<TcpStream> {
    let local = SocketAddr::new(bind_ip_for(local_ip, remote), 0);
    if local.is_ipv4() != remote.is_ipv4() {
        return Err(TransportError::AddressFamily { local, remote });
    }

    let socket = if remote.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|source| TransportError::Connect {
        addr: remote,
        source,
    })?;

    socket
        .bind(local)
        .map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;

    let stream = match tokio::time::timeout(timeout, socket.connect(remote)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(TransportError::Connect {
                addr: remote,
                source,
            })
        }
        Err(_) => {
            return Err(TransportError::ConnectTimeout {
                addr: remote,
                timeout,
            })
        }
    };

    // Commands are a few dozen bytes; don't let Nagle hold them back.
    stream.set_nodelay(true)?;
    debug!(%local, %remote, "tcp stream connected");
    Ok(stream)
}

fn bind_ip_for(local_ip: IpAddr, remote: SocketAddr) -> IpAddr {
    if !local_ip.is_unspecified() {
        return local_ip;
    }
    match remote {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}
