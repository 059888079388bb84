/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::io::BoxRelayStream;

mod error;
pub use error::{RelayError, RelayResult};

mod admission;

mod base;
pub use base::BaseRelayServer;

mod raw;
pub use raw::{
    RawRelay, UDP_SESSION_IDLE_TIMEOUT, UdpSession, accept_websocket, websocket_accept_key,
};

#[async_trait]
pub trait RelayServer: Send + Sync {
    fn label(&self) -> &str;

    /// Relay one accepted stream connection until it is done.
    async fn relay_tcp_conn(&self, clt: BoxRelayStream, client_addr: SocketAddr)
    -> RelayResult<()>;

    /// Relay one datagram flow until it is done.
    async fn relay_udp_conn(&self, clt: BoxRelayStream, client_addr: SocketAddr)
    -> RelayResult<()>;

    /// Handshake with the next remote and return the latency in milliseconds
    /// together with the handshake result.
    async fn health_check(&self) -> (u64, RelayResult<()>);

    async fn close(&self) -> RelayResult<()>;

    async fn listen_and_serve(&self) -> RelayResult<()>;
}
