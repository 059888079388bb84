/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use log::debug;

use super::{ConnectionKind, ConnectionManager};
use crate::conn::RelayConnInfo;

const DEFAULT_CLOSED_CAPACITY: usize = 128;

pub struct MemoryConnectionManager {
    active: Mutex<AHashMap<u64, Arc<RelayConnInfo>>>,
    closed: Mutex<VecDeque<Arc<RelayConnInfo>>>,
    closed_capacity: usize,
}

impl Default for MemoryConnectionManager {
    fn default() -> Self {
        MemoryConnectionManager::new(DEFAULT_CLOSED_CAPACITY)
    }
}

impl MemoryConnectionManager {
    pub fn new(closed_capacity: usize) -> Self {
        MemoryConnectionManager {
            active: Mutex::new(AHashMap::new()),
            closed: Mutex::new(VecDeque::with_capacity(closed_capacity)),
            closed_capacity,
        }
    }
}

impl ConnectionManager for MemoryConnectionManager {
    fn add_connection(&self, conn: Arc<RelayConnInfo>) {
        let mut active = self.active.lock().unwrap();
        active.insert(conn.id(), conn);
    }

    fn remove_connection(&self, conn: &RelayConnInfo) {
        let removed = {
            let mut active = self.active.lock().unwrap();
            active.remove(&conn.id())
        };
        let Some(conn) = removed else {
            return;
        };
        conn.mark_closed();
        debug!(
            "relay {} conn #{} from {} to {} closed, {}",
            conn.relay_label(),
            conn.id(),
            conn.client_addr(),
            conn.remote_address(),
            conn.stats()
        );

        if self.closed_capacity == 0 {
            return;
        }
        let mut closed = self.closed.lock().unwrap();
        if closed.len() >= self.closed_capacity {
            closed.pop_front();
        }
        closed.push_back(conn);
    }

    fn count_connection(&self, kind: ConnectionKind) -> usize {
        match kind {
            ConnectionKind::Active => self.active.lock().unwrap().len(),
            ConnectionKind::Closed => self.closed.lock().unwrap().len(),
            ConnectionKind::All => {
                self.count_connection(ConnectionKind::Active)
                    + self.count_connection(ConnectionKind::Closed)
            }
        }
    }

    fn list_connections(&self, kind: ConnectionKind) -> Vec<Arc<RelayConnInfo>> {
        match kind {
            ConnectionKind::Active => {
                let mut list: Vec<_> = self.active.lock().unwrap().values().cloned().collect();
                list.sort_by_key(|c| c.id());
                list
            }
            ConnectionKind::Closed => self.closed.lock().unwrap().iter().cloned().collect(),
            ConnectionKind::All => {
                let mut list = self.list_connections(ConnectionKind::Active);
                list.extend(self.list_connections(ConnectionKind::Closed));
                list
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmgr::{ArcConnectionManager, ConnectionRegistration};
    use crate::config::RelayOptions;
    use crate::lb::RemoteNode;
    use crate::stat::CONN_TYPE_TCP;

    fn new_conn() -> Arc<RelayConnInfo> {
        Arc::new(RelayConnInfo::new(
            "test",
            RemoteNode::with_address("127.0.0.1:1"),
            CONN_TYPE_TCP,
            "127.0.0.1:2".parse().unwrap(),
            Arc::new(RelayOptions::default()),
        ))
    }

    #[test]
    fn registration() {
        let cmgr: ArcConnectionManager = Arc::new(MemoryConnectionManager::default());
        let c1 = new_conn();
        let c2 = new_conn();

        let r1 = ConnectionRegistration::register(&cmgr, c1.clone());
        {
            let _r2 = ConnectionRegistration::register(&cmgr, c2.clone());
            assert_eq!(cmgr.count_connection(ConnectionKind::Active), 2);
            let list = cmgr.list_connections(ConnectionKind::Active);
            assert_eq!(list[0].id(), c1.id());
        }
        assert_eq!(cmgr.count_connection(ConnectionKind::Active), 1);
        assert_eq!(cmgr.count_connection(ConnectionKind::Closed), 1);
        assert!(c2.closed().is_some());
        assert!(r1.conn().closed().is_none());

        drop(r1);
        assert_eq!(cmgr.count_connection(ConnectionKind::Active), 0);
        assert_eq!(cmgr.count_connection(ConnectionKind::All), 2);
    }

    #[test]
    fn closed_ring() {
        let cmgr = MemoryConnectionManager::new(2);
        let conns: Vec<_> = (0..3).map(|_| new_conn()).collect();
        for c in &conns {
            cmgr.add_connection(c.clone());
        }
        for c in &conns {
            cmgr.remove_connection(c);
        }
        // remove twice is a no-op
        cmgr.remove_connection(&conns[0]);

        let closed = cmgr.list_connections(ConnectionKind::Closed);
        assert_eq!(closed.len(), 2);
        assert_eq!(closed[0].id(), conns[1].id());
        assert_eq!(closed[1].id(), conns[2].id());
    }
}
