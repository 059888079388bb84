/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::relay::{BaseRelayServer, RawRelay, RelayServer};
use crate::transport::{TransportType, socket};

pub struct TcpRelayListener {
    config: Arc<RelayConfig>,
    listener: TcpListener,
    base: Arc<BaseRelayServer>,
    raw: Arc<RawRelay>,
}

impl TcpRelayListener {
    pub fn bind(
        config: Arc<RelayConfig>,
        base: Arc<BaseRelayServer>,
        raw: Arc<RawRelay>,
    ) -> anyhow::Result<Self> {
        let addr = config
            .listen
            .ok_or_else(|| anyhow!("no listen address set"))?;
        let listener = socket::new_tcp_listener(addr, config.options.enable_multipath_tcp)?;
        Ok(TcpRelayListener {
            config,
            listener,
            base,
            raw,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                r = self.listener.accept() => {
                    match r {
                        Ok((stream, peer_addr)) => self.run_task(stream, peer_addr),
                        Err(e) => warn!("relay {}: tcp accept: {e:?}", self.config.label),
                    }
                }
            }
        }
        info!("relay {}: tcp listener stopped", self.config.label);
    }

    fn run_task(&self, stream: TcpStream, peer_addr: SocketAddr) {
        let label = self.config.label.clone();
        match self.config.listen_type {
            TransportType::Raw => {
                let base = self.base.clone();
                tokio::spawn(async move {
                    if let Err(e) = base.relay_tcp_conn(Box::new(stream), peer_addr).await {
                        debug!("relay {label}: conn from {peer_addr} error: {e}");
                    }
                });
            }
            TransportType::Ws => {
                let raw = self.raw.clone();
                tokio::spawn(async move { raw.handle_ws_stream(stream, peer_addr).await });
            }
            TransportType::Wss => {
                let raw = self.raw.clone();
                tokio::spawn(async move { raw.handle_wss_stream(stream, peer_addr).await });
            }
            TransportType::Mwss => {
                let raw = self.raw.clone();
                tokio::spawn(async move { raw.handle_mwss_stream(stream, peer_addr).await });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::cmgr::{ArcConnectionManager, MemoryConnectionManager};
    use crate::lb::RemoteNode;
    use crate::stat::RelayMetrics;

    async fn spawn_echo_server() -> SocketAddr {
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

    #[tokio::test]
    async fn raw_listener() {
        let echo = spawn_echo_server().await;
        let mut config = RelayConfig::new("listen-test");
        config.listen = Some("127.0.0.1:0".parse().unwrap());
        config.tcp_remotes = vec![RemoteNode::with_address(echo.to_string())];
        let config = Arc::new(config);

        let cmgr: ArcConnectionManager = Arc::new(MemoryConnectionManager::default());
        let base = Arc::new(BaseRelayServer::new(config.clone(), cmgr).unwrap());
        let raw = Arc::new(RawRelay::new(&config, Arc::new(RelayMetrics::default())));
        let listener = TcpRelayListener::bind(config, base, raw).unwrap();
        let addr = listener.local_addr().unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"hello relay").await.unwrap();
        let mut buf = [0u8; 11];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello relay");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
