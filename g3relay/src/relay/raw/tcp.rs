/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::RawRelay;
use crate::relay::{RelayError, RelayResult};
use crate::transport::socket;

impl RawRelay {
    /// Relay a plain tcp connection, the terminal error is returned.
    pub async fn handle_tcp_conn<S>(&self, clt: S, client_addr: SocketAddr) -> RelayResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let remote = self
            .tcp_remotes
            .next()
            .ok_or(RelayError::NoRemoteAvailable)?;
        let _gauge = self.metrics.cur_tcp_num(&remote.label);

        let ups = socket::connect_tcp(&remote.address, self.dial_timeout, self.multipath).await?;
        info!(
            "[raw] relay {} tcp conn from {client_addr} to {remote}",
            self.label
        );
        self.transport(clt, ups, &remote, None).await
    }

    /// Relay a stream already demultiplexed from a mwss tunnel, errors are logged only.
    pub async fn handle_mwss_stream<S>(&self, clt: S, client_addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.relay_tunnel(clt, client_addr, "mwss", None).await
    }

    pub(super) async fn relay_tunnel<S>(
        &self,
        clt: S,
        client_addr: SocketAddr,
        kind: &'static str,
        idle_timeout: Option<Duration>,
    ) where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let Some(remote) = self.tcp_remotes.next() else {
            warn!("[tun] relay {} has no tcp remote for {kind}", self.label);
            return;
        };
        let _gauge = self.metrics.cur_tcp_num(&remote.label);

        let ups =
            match socket::connect_tcp(&remote.address, self.dial_timeout, self.multipath).await {
                Ok(s) => s,
                Err(e) => {
                    info!("[tun] relay {} dial error: {e}", self.label);
                    return;
                }
            };

        info!(
            "[tun] relay {} {kind} from {client_addr} to {remote}",
            self.label
        );
        if let Err(e) = self.transport(clt, ups, &remote, idle_timeout).await {
            info!(
                "[tun] relay {} {kind} from {client_addr} err: {e}",
                self.label
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::RelayConfig;
    use crate::lb::RemoteNode;
    use crate::stat::RelayMetrics;

    pub(crate) async fn spawn_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (mut r, mut w) = stream.split();
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                });
            }
        });
        addr
    }

    fn new_relay(remote: SocketAddr, metrics: Arc<RelayMetrics>) -> RawRelay {
        let mut config = RelayConfig::new("raw-test");
        config.tcp_remotes = vec![RemoteNode::new(remote.to_string(), "echo")];
        RawRelay::new(&config, metrics)
    }

    #[tokio::test]
    async fn tcp_echo() {
        let echo = spawn_echo_server().await;
        let metrics = Arc::new(RelayMetrics::default());
        let relay = new_relay(echo, metrics.clone());

        let (mut client, peer) = tokio::io::duplex(1024);
        let peer_task = async {
            client.write_all(b"ping").await.unwrap();
            let mut buf = [0u8; 4];
            client.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ping");
            assert_eq!(metrics.cur_tcp_num_count("echo"), 1);
            client.shutdown().await.unwrap();
            let mut rest = Vec::new();
            client.read_to_end(&mut rest).await.unwrap();
            assert!(rest.is_empty());
        };

        let client_addr = "127.0.0.1:9".parse().unwrap();
        let (r, _) = tokio::join!(relay.handle_tcp_conn(peer, client_addr), peer_task);
        r.unwrap();
        assert_eq!(metrics.cur_tcp_num_count("echo"), 0);
        assert_eq!(metrics.transmitted_bytes("echo"), 8);
    }

    #[tokio::test]
    async fn tcp_dial_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let metrics = Arc::new(RelayMetrics::default());
        let relay = new_relay(addr, metrics.clone());
        let (_client, peer) = tokio::io::duplex(1024);
        let e = relay
            .handle_tcp_conn(peer, "127.0.0.1:9".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(e, RelayError::Handshake(_)));
        assert_eq!(metrics.cur_tcp_num_count("echo"), 0);
    }

    #[tokio::test]
    async fn mwss_echo() {
        let echo = spawn_echo_server().await;
        let metrics = Arc::new(RelayMetrics::default());
        let relay = new_relay(echo, metrics.clone());

        let (mut client, peer) = tokio::io::duplex(1024);
        let peer_task = async {
            client.write_all(b"mux").await.unwrap();
            client.shutdown().await.unwrap();
            let mut rest = Vec::new();
            client.read_to_end(&mut rest).await.unwrap();
            assert_eq!(rest, b"mux");
        };
        tokio::join!(
            relay.handle_mwss_stream(peer, "127.0.0.1:9".parse().unwrap()),
            peer_task
        );
        assert_eq!(metrics.transmitted_bytes("echo"), 6);
    }
}
