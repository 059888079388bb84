/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::transport::HandshakeError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("relay:{relay} active connection count exceed limit {limit}")]
    AdmissionLimitExceeded { relay: String, limit: usize },
    #[error("relay:{relay} blocked protocol:{protocol}")]
    BlockedProtocol {
        relay: String,
        protocol: &'static str,
    },
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("remote address {0} could not be resolved")]
    ResolutionFailure(String),
    #[error("no remote available")]
    NoRemoteAvailable,
    #[error("client read failed: {0:?}")]
    ClientReadFailed(io::Error),
    #[error("client write failed: {0:?}")]
    ClientWriteFailed(io::Error),
    #[error("remote read failed: {0:?}")]
    RemoteReadFailed(io::Error),
    #[error("remote write failed: {0:?}")]
    RemoteWriteFailed(io::Error),
    #[error("idle after {0:?}")]
    Idle(Duration),
    #[error("websocket upgrade failed: {0}")]
    UpgradeFailed(String),
    #[error("not supported: {0}")]
    NotSupported(&'static str),
}

impl RelayError {
    pub fn brief(&self) -> &'static str {
        match self {
            RelayError::AdmissionLimitExceeded { .. } => "AdmissionLimitExceeded",
            RelayError::BlockedProtocol { .. } => "BlockedProtocol",
            RelayError::Handshake(_) => "HandshakeFailure",
            RelayError::ResolutionFailure(_) => "ResolutionFailure",
            RelayError::NoRemoteAvailable => "NoRemoteAvailable",
            RelayError::ClientReadFailed(_) => "ClientReadFailed",
            RelayError::ClientWriteFailed(_) => "ClientWriteFailed",
            RelayError::RemoteReadFailed(_) => "RemoteReadFailed",
            RelayError::RemoteWriteFailed(_) => "RemoteWriteFailed",
            RelayError::Idle(_) => "Idle",
            RelayError::UpgradeFailed(_) => "UpgradeFailed",
            RelayError::NotSupported(_) => "NotSupported",
        }
    }

    /// Errors raised while bytes were being copied between the two peers.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            RelayError::ClientReadFailed(_)
                | RelayError::ClientWriteFailed(_)
                | RelayError::RemoteReadFailed(_)
                | RelayError::RemoteWriteFailed(_)
                | RelayError::Idle(_)
        )
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message() {
        let e = RelayError::AdmissionLimitExceeded {
            relay: "r1".to_string(),
            limit: 10,
        };
        assert_eq!(e.to_string(), "relay:r1 active connection count exceed limit 10");
        assert_eq!(e.brief(), "AdmissionLimitExceeded");

        let e = RelayError::BlockedProtocol {
            relay: "r1".to_string(),
            protocol: "tls",
        };
        assert_eq!(e.to_string(), "relay:r1 blocked protocol:tls");

        let e = RelayError::from(HandshakeError::NoAddressResolved("a:1".to_string()));
        assert_eq!(e.to_string(), "handshake error: no address resolved for a:1");
        assert!(!e.is_transport_failure());
    }
}
