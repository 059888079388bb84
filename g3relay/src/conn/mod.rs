/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::RelayOptions;
use crate::io::BoxRelayStream;
use crate::lb::RemoteNode;
use crate::relay::{RelayError, RelayResult, UDP_SESSION_IDLE_TIMEOUT};
use crate::stat::{CONN_TYPE_UDP, ConnStats};

mod transit;
pub use transit::transit;

static CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Metadata of one relayed flow.
#[derive(Debug)]
pub struct RelayConnInfo {
    id: u64,
    relay_label: String,
    remote: RemoteNode,
    conn_type: &'static str,
    client_addr: SocketAddr,
    options: Arc<RelayOptions>,
    created: DateTime<Utc>,
    closed: OnceLock<DateTime<Utc>>,
    stats: Arc<ConnStats>,
}

impl RelayConnInfo {
    pub fn new(
        relay_label: &str,
        remote: RemoteNode,
        conn_type: &'static str,
        client_addr: SocketAddr,
        options: Arc<RelayOptions>,
    ) -> Self {
        RelayConnInfo {
            id: CONN_ID.fetch_add(1, Ordering::Relaxed),
            relay_label: relay_label.to_string(),
            remote,
            conn_type,
            client_addr,
            options,
            created: Utc::now(),
            closed: OnceLock::new(),
            stats: Arc::new(ConnStats::default()),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn relay_label(&self) -> &str {
        &self.relay_label
    }

    pub fn remote_label(&self) -> &str {
        &self.remote.label
    }

    pub fn remote_address(&self) -> &str {
        &self.remote.address
    }

    pub fn conn_type(&self) -> &'static str {
        self.conn_type
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    pub fn handshake_duration(&self) -> Duration {
        self.remote.handshake_duration
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn closed(&self) -> Option<DateTime<Utc>> {
        self.closed.get().copied()
    }

    pub(crate) fn mark_closed(&self) {
        let _ = self.closed.set(Utc::now());
    }

    pub fn stats(&self) -> &Arc<ConnStats> {
        &self.stats
    }
}

/// The pairing of the client stream and the remote stream of one flow.
pub struct RelayConn {
    info: Arc<RelayConnInfo>,
    client: BoxRelayStream,
    remote: BoxRelayStream,
}

impl RelayConn {
    pub fn new(info: Arc<RelayConnInfo>, client: BoxRelayStream, remote: BoxRelayStream) -> Self {
        RelayConn {
            info,
            client,
            remote,
        }
    }

    pub fn info(&self) -> &Arc<RelayConnInfo> {
        &self.info
    }

    /// Copy in both directions until both sides are closed.
    ///
    /// Datagram flows never see EOF from the remote, so they always run with
    /// an idle deadline and reaching it is their normal end.
    pub async fn transport(self) -> RelayResult<()> {
        let is_datagram = self.info.conn_type == CONN_TYPE_UDP;
        let idle_timeout = match self.info.options.idle_timeout {
            None if is_datagram => Some(UDP_SESSION_IDLE_TIMEOUT),
            t => t,
        };
        match transit(self.client, self.remote, &self.info.stats, idle_timeout).await {
            Err(RelayError::Idle(_)) if is_datagram => Ok(()),
            r => r,
        }
    }
}
