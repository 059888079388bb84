/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::time::Duration;

mod round_robin;
pub use round_robin::RoundRobinPool;

/// A backend endpoint candidate.
///
/// Pools hand out owned copies, so the handshake duration recorded for one
/// flow never leaks into another flow that picked the same node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteNode {
    pub address: String,
    pub label: String,
    pub handshake_duration: Duration,
}

impl RemoteNode {
    pub fn new(address: impl Into<String>, label: impl Into<String>) -> Self {
        RemoteNode {
            address: address.into(),
            label: label.into(),
            handshake_duration: Duration::ZERO,
        }
    }

    pub fn with_address(address: impl Into<String>) -> Self {
        let address = address.into();
        let label = address.clone();
        RemoteNode::new(address, label)
    }
}

impl fmt::Display for RemoteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label == self.address {
            f.write_str(&self.address)
        } else {
            write!(f, "{}({})", self.label, self.address)
        }
    }
}
