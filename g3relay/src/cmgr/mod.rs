/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use crate::conn::RelayConnInfo;

mod memory;
pub use memory::MemoryConnectionManager;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    Active,
    Closed,
    All,
}

/// Book keeping of relay connections, shared by all relays.
pub trait ConnectionManager: Send + Sync {
    fn add_connection(&self, conn: Arc<RelayConnInfo>);
    fn remove_connection(&self, conn: &RelayConnInfo);
    fn count_connection(&self, kind: ConnectionKind) -> usize;
    fn list_connections(&self, kind: ConnectionKind) -> Vec<Arc<RelayConnInfo>>;
}

pub type ArcConnectionManager = Arc<dyn ConnectionManager>;

/// Keep `conn` registered as long as this value is alive.
pub struct ConnectionRegistration {
    cmgr: ArcConnectionManager,
    conn: Arc<RelayConnInfo>,
}

impl ConnectionRegistration {
    pub fn register(cmgr: &ArcConnectionManager, conn: Arc<RelayConnInfo>) -> Self {
        cmgr.add_connection(conn.clone());
        ConnectionRegistration {
            cmgr: cmgr.clone(),
            conn,
        }
    }

    pub fn conn(&self) -> &Arc<RelayConnInfo> {
        &self.conn
    }
}

impl Drop for ConnectionRegistration {
    fn drop(&mut self) {
        self.cmgr.remove_connection(&self.conn);
    }
}
