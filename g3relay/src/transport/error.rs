/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("resolve {0} failed: {1:?}")]
    ResolveFailed(String, io::Error),
    #[error("no address resolved for {0}")]
    NoAddressResolved(String),
    #[error("connect failed: {0:?}")]
    ConnectFailed(io::Error),
    #[error("connect timed out after {0:?}")]
    ConnectTimedOut(Duration),
    #[error("setup socket failed: {0:?}")]
    SetupSocketFailed(io::Error),
    #[error("unsupported transport {0}")]
    Unsupported(&'static str),
}

impl HandshakeError {
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            HandshakeError::ResolveFailed(_, _) | HandshakeError::NoAddressResolved(_)
        )
    }
}
