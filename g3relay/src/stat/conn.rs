/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::pretty_byte_size;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrafficSnapshot {
    /// client to remote
    pub up: u64,
    /// remote to client
    pub down: u64,
}

impl TrafficSnapshot {
    pub fn total(&self) -> u64 {
        self.up.saturating_add(self.down)
    }
}

impl fmt::Display for TrafficSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "up: {}, down: {}",
            pretty_byte_size(self.up),
            pretty_byte_size(self.down)
        )
    }
}

/// Traffic counters of a single relayed flow.
#[derive(Debug, Default)]
pub struct ConnStats {
    up: AtomicU64,
    down: AtomicU64,
}

impl ConnStats {
    pub fn record_traffic(&self, down: u64, up: u64) {
        if down > 0 {
            self.down.fetch_add(down, Ordering::Relaxed);
        }
        if up > 0 {
            self.up.fetch_add(up, Ordering::Relaxed);
        }
    }

    pub fn reset_traffic(&self) {
        self.up.store(0, Ordering::Relaxed);
        self.down.store(0, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            up: self.up.load(Ordering::Relaxed),
            down: self.down.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for ConnStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.get_stats().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn display() {
        let stats = ConnStats::default();
        stats.record_traffic(340 * 1024, 1258291);
        assert_eq!(stats.to_string(), "up: 1.2MB, down: 340.0KB");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_record() {
        let stats = Arc::new(ConnStats::default());

        let mut handles = Vec::new();
        for i in 0..64u64 {
            let stats = stats.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    stats.record_traffic(i, 2 * i);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let sum: u64 = (0..64u64).sum::<u64>() * 100;
        let snapshot = stats.get_stats();
        assert_eq!(snapshot.down, sum);
        assert_eq!(snapshot.up, 2 * sum);

        stats.reset_traffic();
        assert_eq!(stats.get_stats(), TrafficSnapshot::default());
    }
}
