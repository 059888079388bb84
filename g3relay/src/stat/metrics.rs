/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::hash::Hash;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use ahash::AHashMap;

pub const CONN_TYPE_TCP: &str = "tcp";
pub const CONN_TYPE_UDP: &str = "udp";

static GLOBAL_METRICS: OnceLock<Arc<RelayMetrics>> = OnceLock::new();

/// Increase the gauge when created and decrease it when dropped.
pub struct GaugeGuard {
    gauge: Arc<AtomicI64>,
}

impl GaugeGuard {
    fn new(gauge: Arc<AtomicI64>) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        GaugeGuard { gauge }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::Relaxed);
    }
}

struct Labeled<K, V> {
    inner: Mutex<AHashMap<K, Arc<V>>>,
}

impl<K, V> Default for Labeled<K, V> {
    fn default() -> Self {
        Labeled {
            inner: Mutex::new(AHashMap::new()),
        }
    }
}

impl<K: Hash + Eq, V: Default> Labeled<K, V> {
    fn get(&self, key: K) -> Arc<V> {
        let mut map = self.inner.lock().unwrap();
        map.entry(key).or_default().clone()
    }

    fn find<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let map = self.inner.lock().unwrap();
        map.get(key).cloned()
    }
}

/// Labeled gauges and counters of all relays in this process.
#[derive(Default)]
pub struct RelayMetrics {
    cur_connection: Labeled<(String, &'static str), AtomicI64>,
    cur_udp_session: Labeled<String, AtomicI64>,
    cur_tcp_num: Labeled<String, AtomicI64>,
    transmitted_bytes: Labeled<String, AtomicU64>,
    handshake_millis: Labeled<String, AtomicU64>,
}

impl RelayMetrics {
    pub fn global() -> Arc<RelayMetrics> {
        GLOBAL_METRICS
            .get_or_init(|| Arc::new(RelayMetrics::default()))
            .clone()
    }

    pub fn cur_connection(&self, remote: &str, conn_type: &'static str) -> GaugeGuard {
        GaugeGuard::new(self.cur_connection.get((remote.to_string(), conn_type)))
    }

    pub fn cur_connection_count(&self, remote: &str, conn_type: &'static str) -> i64 {
        self.cur_connection
            .find(&(remote.to_string(), conn_type))
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    pub fn cur_udp_session(&self, remote: &str) -> GaugeGuard {
        GaugeGuard::new(self.cur_udp_session.get(remote.to_string()))
    }

    pub fn cur_udp_session_count(&self, remote: &str) -> i64 {
        self.cur_udp_session
            .find(remote)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    pub fn cur_tcp_num(&self, remote: &str) -> GaugeGuard {
        GaugeGuard::new(self.cur_tcp_num.get(remote.to_string()))
    }

    pub fn cur_tcp_num_count(&self, remote: &str) -> i64 {
        self.cur_tcp_num
            .find(remote)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    pub fn add_transmitted_bytes(&self, remote: &str, size: u64) {
        if size > 0 {
            self.transmitted_bytes
                .get(remote.to_string())
                .fetch_add(size, Ordering::Relaxed);
        }
    }

    pub fn transmitted_bytes(&self, remote: &str) -> u64 {
        self.transmitted_bytes
            .find(remote)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    pub fn set_handshake_duration(&self, remote: &str, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.handshake_millis
            .get(remote.to_string())
            .store(millis, Ordering::Relaxed);
    }

    pub fn handshake_millis(&self, remote: &str) -> Option<u64> {
        self.handshake_millis
            .find(remote)
            .map(|v| v.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_guard() {
        let metrics = RelayMetrics::default();
        assert_eq!(metrics.cur_connection_count("r1", CONN_TYPE_TCP), 0);
        {
            let _g1 = metrics.cur_connection("r1", CONN_TYPE_TCP);
            let _g2 = metrics.cur_connection("r1", CONN_TYPE_TCP);
            let _g3 = metrics.cur_connection("r1", CONN_TYPE_UDP);
            assert_eq!(metrics.cur_connection_count("r1", CONN_TYPE_TCP), 2);
            assert_eq!(metrics.cur_connection_count("r1", CONN_TYPE_UDP), 1);
        }
        assert_eq!(metrics.cur_connection_count("r1", CONN_TYPE_TCP), 0);
        assert_eq!(metrics.cur_connection_count("r1", CONN_TYPE_UDP), 0);
    }

    #[test]
    fn counters() {
        let metrics = RelayMetrics::default();
        metrics.add_transmitted_bytes("r1", 10);
        metrics.add_transmitted_bytes("r1", 20);
        metrics.add_transmitted_bytes("r2", 0);
        assert_eq!(metrics.transmitted_bytes("r1"), 30);
        assert_eq!(metrics.transmitted_bytes("r2"), 0);

        assert!(metrics.handshake_millis("r1").is_none());
        metrics.set_handshake_duration("r1", Duration::from_millis(15));
        assert_eq!(metrics.handshake_millis("r1"), Some(15));
    }
}
