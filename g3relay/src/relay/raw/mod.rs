/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ahash::AHashMap;
use tokio::io::{AsyncRead, AsyncWrite};

use super::RelayResult;
use crate::config::RelayConfig;
use crate::conn::transit;
use crate::lb::{RemoteNode, RoundRobinPool};
use crate::stat::{ConnStats, RelayMetrics};

mod tcp;

mod ws;
pub use ws::{accept_websocket, websocket_accept_key};

mod udp;
pub use udp::UdpSession;

/// Idle deadline of the remote socket of each udp session.
pub const UDP_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Relay directly to round-robin remotes, without admission, sniff or rate limit.
pub struct RawRelay {
    label: String,
    tcp_remotes: RoundRobinPool,
    udp_remotes: RoundRobinPool,
    sessions: Mutex<AHashMap<String, Arc<UdpSession>>>,
    metrics: Arc<RelayMetrics>,
    dial_timeout: Duration,
    multipath: bool,
    ws_idle_timeout: Option<Duration>,
    pub(crate) udp_idle_timeout: Duration,
}

impl RawRelay {
    pub fn new(config: &RelayConfig, metrics: Arc<RelayMetrics>) -> Self {
        RawRelay {
            label: config.label.clone(),
            tcp_remotes: RoundRobinPool::new(config.tcp_remotes.clone()),
            udp_remotes: RoundRobinPool::new(config.udp_remotes.clone()),
            sessions: Mutex::new(AHashMap::new()),
            metrics,
            dial_timeout: config.options.dial_timeout,
            multipath: config.options.enable_multipath_tcp,
            ws_idle_timeout: config.options.idle_timeout,
            udp_idle_timeout: UDP_SESSION_IDLE_TIMEOUT,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn transport<C, R>(
        &self,
        clt: C,
        ups: R,
        remote: &RemoteNode,
        idle_timeout: Option<Duration>,
    ) -> RelayResult<()>
    where
        C: AsyncRead + AsyncWrite,
        R: AsyncRead + AsyncWrite,
    {
        let stats = ConnStats::default();
        let r = transit(clt, ups, &stats, idle_timeout).await;
        self.metrics
            .add_transmitted_bytes(&remote.label, stats.get_stats().total());
        r
    }
}
