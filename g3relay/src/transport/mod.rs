/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RelayOptions;
use crate::io::BoxRelayStream;
use crate::lb::RemoteNode;
use crate::relay::{RelayError, RelayResult};

mod error;
pub use error::HandshakeError;

mod raw;
pub use raw::RawClient;

pub mod socket;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportType {
    #[default]
    Raw,
    Ws,
    Wss,
    Mwss,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Raw => "raw",
            TransportType::Ws => "ws",
            TransportType::Wss => "wss",
            TransportType::Mwss => "mwss",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" | "tcp" => Ok(TransportType::Raw),
            "ws" | "websocket" => Ok(TransportType::Ws),
            "wss" => Ok(TransportType::Wss),
            "mwss" => Ok(TransportType::Mwss),
            _ => Err(()),
        }
    }
}

/// Establish outbound connections to remote nodes.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Connect to `remote` and record the handshake duration onto it.
    ///
    /// `is_stream` selects stream mode, otherwise a datagram connection is
    /// returned.
    async fn handshake(
        &self,
        remote: &mut RemoteNode,
        is_stream: bool,
    ) -> Result<BoxRelayStream, HandshakeError>;
}

pub type ArcRelayClient = Arc<dyn RelayClient>;

pub fn new_client(
    transport_type: TransportType,
    options: &RelayOptions,
) -> RelayResult<ArcRelayClient> {
    match transport_type {
        TransportType::Raw => Ok(Arc::new(RawClient::new(
            options.dial_timeout,
            options.enable_multipath_tcp,
        ))),
        TransportType::Ws => Err(RelayError::NotSupported("ws transport client")),
        TransportType::Wss => Err(RelayError::NotSupported("wss transport client")),
        TransportType::Mwss => Err(RelayError::NotSupported("mwss transport client")),
    }
}
