/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::relay::RelayServer;

/// Check the remotes of one relay periodically.
pub struct HealthChecker<S: ?Sized> {
    server: Arc<S>,
    interval: Duration,
}

impl<S: RelayServer + ?Sized> HealthChecker<S> {
    pub fn new(server: Arc<S>, interval: Duration) -> Self {
        HealthChecker { server, interval }
    }

    pub async fn check_once(&self) -> Option<u64> {
        let (millis, r) = self.server.health_check().await;
        match r {
            Ok(_) => {
                info!(
                    "relay {}: health check ok, latency {millis}ms",
                    self.server.label()
                );
                Some(millis)
            }
            Err(e) => {
                warn!(
                    "relay {}: health check failed after {millis}ms: {e}",
                    self.server.label()
                );
                None
            }
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.check_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::io::BoxRelayStream;
    use crate::relay::{RelayError, RelayResult};

    #[derive(Default)]
    struct CountingServer {
        checks: AtomicUsize,
    }

    #[async_trait]
    impl RelayServer for CountingServer {
        fn label(&self) -> &str {
            "counting"
        }

        async fn relay_tcp_conn(&self, _: BoxRelayStream, _: SocketAddr) -> RelayResult<()> {
            Err(RelayError::NotSupported("tcp"))
        }

        async fn relay_udp_conn(&self, _: BoxRelayStream, _: SocketAddr) -> RelayResult<()> {
            Err(RelayError::NotSupported("udp"))
        }

        async fn health_check(&self) -> (u64, RelayResult<()>) {
            match self.checks.fetch_add(1, Ordering::SeqCst) {
                0 => (12, Ok(())),
                _ => (3, Err(RelayError::NoRemoteAvailable)),
            }
        }

        async fn close(&self) -> RelayResult<()> {
            Ok(())
        }

        async fn listen_and_serve(&self) -> RelayResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn check_once() {
        let checker =
            HealthChecker::new(Arc::new(CountingServer::default()), Duration::from_secs(1));
        assert_eq!(checker.check_once().await, Some(12));
        assert_eq!(checker.check_once().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic() {
        let server = Arc::new(CountingServer::default());
        let checker = HealthChecker::new(server.clone(), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(checker.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(35)).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(server.checks.load(Ordering::SeqCst), 3);
    }
}
