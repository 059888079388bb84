/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::{TcpListener, TcpSocket, TcpStream, UdpSocket};

use super::HandshakeError;

const LISTEN_BACKLOG: i32 = 1024;

#[cfg(target_os = "linux")]
fn new_mptcp_socket(domain: Domain) -> io::Result<Socket> {
    Socket::new(domain, Type::STREAM.nonblocking(), Some(Protocol::MPTCP))
}

#[cfg(not(target_os = "linux"))]
fn new_mptcp_socket(_domain: Domain) -> io::Result<Socket> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "multipath tcp is not supported on this platform",
    ))
}

fn new_tcp_socket(addr: &SocketAddr, multipath: bool) -> io::Result<Socket> {
    let domain = Domain::for_address(*addr);
    let socket = if multipath {
        match new_mptcp_socket(domain) {
            Ok(s) => s,
            Err(e) => {
                debug!("failed to create mptcp socket, fallback to tcp: {e}");
                Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?
            }
        }
    } else {
        Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?
    };
    socket.set_nonblocking(true)?;
    Ok(socket)
}

pub fn new_tcp_listener(addr: SocketAddr, multipath: bool) -> io::Result<TcpListener> {
    let socket = new_tcp_socket(&addr, multipath)?;
    if addr.port() != 0 {
        #[cfg(unix)]
        socket.set_reuse_address(true)?;
    }
    let bind_addr: SockAddr = addr.into();
    socket.bind(&bind_addr)?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(std::net::TcpListener::from(socket))
}

async fn resolve(address: &str) -> Result<Vec<SocketAddr>, HandshakeError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(address)
        .await
        .map_err(|e| HandshakeError::ResolveFailed(address.to_string(), e))?
        .collect();
    if addrs.is_empty() {
        Err(HandshakeError::NoAddressResolved(address.to_string()))
    } else {
        Ok(addrs)
    }
}

async fn connect_tcp_addr(addr: SocketAddr, multipath: bool) -> io::Result<TcpStream> {
    let socket = new_tcp_socket(&addr, multipath)?;
    let socket = TcpSocket::from_std_stream(std::net::TcpStream::from(socket));
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

async fn with_dial_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, HandshakeError>
where
    F: Future<Output = Result<T, HandshakeError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| HandshakeError::ConnectTimedOut(timeout))?
}

/// Connect to the first reachable address of `address`.
///
/// `timeout` bounds resolution and all connect attempts together.
pub async fn connect_tcp(
    address: &str,
    timeout: Duration,
    multipath: bool,
) -> Result<TcpStream, HandshakeError> {
    with_dial_timeout(timeout, async {
        let addrs = resolve(address).await?;

        let mut last_err = HandshakeError::NoAddressResolved(address.to_string());
        for addr in addrs {
            match connect_tcp_addr(addr, multipath).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = HandshakeError::ConnectFailed(e),
            }
        }
        Err(last_err)
    })
    .await
}

/// Create a udp socket connected to `address`.
pub async fn connect_udp(address: &str, timeout: Duration) -> Result<UdpSocket, HandshakeError> {
    with_dial_timeout(timeout, async {
        let addrs = resolve(address).await?;
        let peer = addrs[0];
        let bind_addr = match peer.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(HandshakeError::SetupSocketFailed)?;
        socket
            .connect(peer)
            .await
            .map_err(HandshakeError::ConnectFailed)?;
        Ok(socket)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn listen_and_connect() {
        let listener = new_tcp_listener("127.0.0.1:0".parse().unwrap(), false).unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"hi").await.unwrap();
        });

        let mut stream = connect_tcp(&addr.to_string(), Duration::from_secs(1), false)
            .await
            .unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hi");
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn multipath_fallback() {
        let listener = new_tcp_listener("127.0.0.1:0".parse().unwrap(), true).unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        connect_tcp(&addr.to_string(), Duration::from_secs(1), true)
            .await
            .unwrap();
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn resolve_failure() {
        let e = connect_udp("not a socket address", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(e.is_resolution_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_dial_timed_out() {
        // a resolver that never answers
        let stalled = async {
            std::future::pending::<()>().await;
            resolve("127.0.0.1:80").await
        };
        let e = with_dial_timeout(Duration::from_millis(200), stalled)
            .await
            .unwrap_err();
        assert!(matches!(e, HandshakeError::ConnectTimedOut(d) if d == Duration::from_millis(200)));
        assert!(!e.is_resolution_failure());
    }

    #[tokio::test]
    async fn dial_within_timeout() {
        let socket = connect_udp("127.0.0.1:53", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(socket.peer_addr().unwrap(), "127.0.0.1:53".parse().unwrap());
    }
}
