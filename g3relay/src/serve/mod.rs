/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::{Context, anyhow};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cmgr::ArcConnectionManager;
use crate::config::RelayConfig;
use crate::relay::{BaseRelayServer, RawRelay};
use crate::stat::RelayMetrics;

mod tcp;
pub use tcp::TcpRelayListener;

mod udp;
pub use udp::UdpRelayListener;

mod health;
pub use health::HealthChecker;

/// Start the listeners of all relays, they will stop when `cancel` is triggered.
pub async fn spawn_all(
    configs: Vec<RelayConfig>,
    cmgr: ArcConnectionManager,
    cancel: CancellationToken,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let metrics = RelayMetrics::global();
    let mut tasks = Vec::with_capacity(configs.len());

    for config in configs {
        let config = Arc::new(config);
        let label = config.label.clone();
        let listen = config
            .listen
            .ok_or_else(|| anyhow!("no listen address set for relay {label}"))?;

        let base = BaseRelayServer::new(config.clone(), cmgr.clone())
            .map_err(|e| anyhow!("failed to create relay {label}: {e}"))?;
        let base = Arc::new(base);
        let raw = Arc::new(RawRelay::new(&config, metrics.clone()));

        let listener = TcpRelayListener::bind(config.clone(), base.clone(), raw.clone())
            .with_context(|| format!("failed to start tcp listener for relay {label}"))?;
        info!(
            "relay {label}: {} listening on tcp {listen}",
            config.listen_type
        );
        tasks.push(tokio::spawn(listener.run(cancel.clone())));

        if !config.udp_remotes.is_empty() {
            let listener = UdpRelayListener::bind(listen, raw.clone())
                .await
                .with_context(|| format!("failed to start udp listener for relay {label}"))?;
            info!("relay {label}: listening on udp {listen}");
            tasks.push(tokio::spawn(listener.run(cancel.clone())));
        }

        if let Some(interval) = config.options.health_check_interval {
            let checker = HealthChecker::new(base, interval);
            tasks.push(tokio::spawn(checker.run(cancel.clone())));
        }
    }

    Ok(tasks)
}
