/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{HandshakeError, RelayClient, socket};
use crate::io::{BoxRelayStream, UdpConnStream};
use crate::lb::RemoteNode;

/// Plain tcp or udp connection to the remote.
pub struct RawClient {
    dial_timeout: Duration,
    multipath: bool,
}

impl RawClient {
    pub fn new(dial_timeout: Duration, multipath: bool) -> Self {
        RawClient {
            dial_timeout,
            multipath,
        }
    }
}

#[async_trait]
impl RelayClient for RawClient {
    async fn handshake(
        &self,
        remote: &mut RemoteNode,
        is_stream: bool,
    ) -> Result<BoxRelayStream, HandshakeError> {
        let started = Instant::now();
        let stream: BoxRelayStream = if is_stream {
            let stream =
                socket::connect_tcp(&remote.address, self.dial_timeout, self.multipath).await?;
            Box::new(stream)
        } else {
            let socket = socket::connect_udp(&remote.address, self.dial_timeout).await?;
            Box::new(UdpConnStream::new(socket))
        };
        remote.handshake_duration = started.elapsed();
        Ok(stream)
    }
}
