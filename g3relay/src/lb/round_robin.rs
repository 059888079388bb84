/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicUsize, Ordering};

use super::RemoteNode;

#[derive(Debug, Default)]
pub struct RoundRobinPool {
    nodes: Vec<RemoteNode>,
    rr_id: AtomicUsize,
}

impl RoundRobinPool {
    pub fn new(nodes: Vec<RemoteNode>) -> Self {
        RoundRobinPool {
            nodes,
            rr_id: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[RemoteNode] {
        &self.nodes
    }

    /// Pick the next node, returned as an owned copy.
    pub fn next(&self) -> Option<RemoteNode> {
        match self.nodes.len() {
            0 => None,
            1 => Some(self.nodes[0].clone()),
            len => {
                let id = self.rr_id.fetch_add(1, Ordering::Relaxed) % len;
                Some(self.nodes[id].clone())
            }
        }
    }
}
