/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, info};

use super::admission::{AdmissionGate, AdmissionPermit};
use super::{RelayError, RelayResult, RelayServer};
use crate::cmgr::{ArcConnectionManager, ConnectionKind, ConnectionRegistration};
use crate::config::RelayConfig;
use crate::conn::{RelayConn, RelayConnInfo};
use crate::io::{BoxRelayStream, CachedStream, RateLimitedStream};
use crate::lb::{RemoteNode, RoundRobinPool};
use crate::sniff::{self, SNIFF_BUFFER_SIZE, Signature};
use crate::stat::{CONN_TYPE_TCP, CONN_TYPE_UDP, RelayMetrics};
use crate::transport::{self, ArcRelayClient};

const SNIFF_SIGNATURES: &[Signature] = &[Signature::TlsClientHello, Signature::HttpHost];

/// Run the full relay pipeline for each accepted flow:
/// admission, sniff, rate limit, handshake and then transport.
pub struct BaseRelayServer {
    config: Arc<RelayConfig>,
    cmgr: ArcConnectionManager,
    tcp_remotes: RoundRobinPool,
    udp_remotes: RoundRobinPool,
    client: ArcRelayClient,
    metrics: Arc<RelayMetrics>,
    admission: AdmissionGate,
}

impl BaseRelayServer {
    pub fn new(config: Arc<RelayConfig>, cmgr: ArcConnectionManager) -> RelayResult<Self> {
        let client = transport::new_client(config.transport_type, &config.options)?;
        Ok(BaseRelayServer::with_client(
            config,
            cmgr,
            client,
            RelayMetrics::global(),
        ))
    }

    pub fn with_client(
        config: Arc<RelayConfig>,
        cmgr: ArcConnectionManager,
        client: ArcRelayClient,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        let tcp_remotes = RoundRobinPool::new(config.tcp_remotes.clone());
        let udp_remotes = if config.udp_remotes.is_empty() {
            RoundRobinPool::new(config.tcp_remotes.clone())
        } else {
            RoundRobinPool::new(config.udp_remotes.clone())
        };
        BaseRelayServer {
            config,
            cmgr,
            tcp_remotes,
            udp_remotes,
            client,
            metrics,
            admission: AdmissionGate::default(),
        }
    }

    pub fn config(&self) -> &Arc<RelayConfig> {
        &self.config
    }

    fn check_connection_limit(&self) -> RelayResult<Option<AdmissionPermit>> {
        let max = self.config.options.max_connection;
        if max == 0 {
            return Ok(None);
        }

        let limit_exceeded = || RelayError::AdmissionLimitExceeded {
            relay: self.config.label.clone(),
            limit: max,
        };
        if self.cmgr.count_connection(ConnectionKind::Active) >= max {
            return Err(limit_exceeded());
        }
        // also count the flows that are still in handshake
        self.admission
            .try_acquire(max)
            .map(Some)
            .ok_or_else(limit_exceeded)
    }

    async fn sniff_and_block_protocol(
        &self,
        mut clt: BoxRelayStream,
    ) -> RelayResult<BoxRelayStream> {
        let options = &self.config.options;
        if options.blocked_protocols.is_empty() {
            return Ok(clt);
        }

        let mut buf = BytesMut::with_capacity(SNIFF_BUFFER_SIZE);
        match sniff::peek_stream(&mut clt, &mut buf, options.sniff_timeout, SNIFF_SIGNATURES).await
        {
            Ok(Some(meta)) => {
                info!(
                    "relay {}: sniffed protocol: {}",
                    self.config.label, meta.protocol
                );
                if options.blocked_protocols.iter().any(|p| p == meta.protocol) {
                    return Err(RelayError::BlockedProtocol {
                        relay: self.config.label.clone(),
                        protocol: meta.protocol,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => debug!("relay {}: sniff error: {e}", self.config.label),
        }

        if buf.is_empty() {
            Ok(clt)
        } else {
            Ok(Box::new(CachedStream::new(clt, buf)))
        }
    }

    fn apply_rate_limit(&self, clt: BoxRelayStream) -> BoxRelayStream {
        let kbps = self.config.options.max_read_rate_kbps;
        if kbps > 0 {
            Box::new(RateLimitedStream::new(clt, kbps))
        } else {
            clt
        }
    }

    async fn handle_relay_conn(
        &self,
        clt: BoxRelayStream,
        ups: BoxRelayStream,
        remote: RemoteNode,
        conn_type: &'static str,
        client_addr: SocketAddr,
    ) -> RelayResult<()> {
        self.metrics
            .set_handshake_duration(&remote.label, remote.handshake_duration);
        let info = Arc::new(RelayConnInfo::new(
            &self.config.label,
            remote,
            conn_type,
            client_addr,
            self.config.options.clone(),
        ));
        let _registration = ConnectionRegistration::register(&self.cmgr, info.clone());
        RelayConn::new(info, clt, ups).transport().await
    }
}

#[async_trait]
impl RelayServer for BaseRelayServer {
    fn label(&self) -> &str {
        &self.config.label
    }

    async fn relay_tcp_conn(
        &self,
        clt: BoxRelayStream,
        client_addr: SocketAddr,
    ) -> RelayResult<()> {
        let mut remote = self
            .tcp_remotes
            .next()
            .ok_or(RelayError::NoRemoteAvailable)?;
        let _gauge = self.metrics.cur_connection(&remote.label, CONN_TYPE_TCP);

        let _permit = self.check_connection_limit()?;

        let clt = self.sniff_and_block_protocol(clt).await?;
        let clt = self.apply_rate_limit(clt);

        let ups = self.client.handshake(&mut remote, true).await?;

        info!(
            "relay {}: tcp conn from {client_addr} to {remote}",
            self.config.label
        );
        self.handle_relay_conn(clt, ups, remote, CONN_TYPE_TCP, client_addr)
            .await
    }

    async fn relay_udp_conn(
        &self,
        clt: BoxRelayStream,
        client_addr: SocketAddr,
    ) -> RelayResult<()> {
        let mut remote = self
            .udp_remotes
            .next()
            .ok_or(RelayError::NoRemoteAvailable)?;
        let _gauge = self.metrics.cur_connection(&remote.label, CONN_TYPE_UDP);

        let ups = self.client.handshake(&mut remote, false).await?;

        info!(
            "relay {}: udp conn from {client_addr} to {remote}",
            self.config.label
        );
        self.handle_relay_conn(clt, ups, remote, CONN_TYPE_UDP, client_addr)
            .await
    }

    async fn health_check(&self) -> (u64, RelayResult<()>) {
        let Some(mut remote) = self.tcp_remotes.next() else {
            return (0, Err(RelayError::NoRemoteAvailable));
        };
        let started = Instant::now();
        let (elapsed, r) = match self.client.handshake(&mut remote, true).await {
            Ok(_ups) => (remote.handshake_duration, Ok(())),
            Err(e) => (started.elapsed(), Err(e.into())),
        };
        (u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX), r)
    }

    async fn close(&self) -> RelayResult<()> {
        Err(RelayError::NotSupported("close base relay server"))
    }

    async fn listen_and_serve(&self) -> RelayResult<()> {
        Err(RelayError::NotSupported("listen on base relay server"))
    }
}
