/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::Context;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use g3relay::cmgr::{ArcConnectionManager, MemoryConnectionManager};
use g3relay::config::RelayConfig;

fn main() -> anyhow::Result<()> {
    let Some(proc_args) =
        g3relay::opts::parse_clap().context("failed to parse command line options")?
    else {
        return Ok(());
    };

    // set up process logger early, only proc args is used inside
    let _log_guard =
        g3relay::log::setup(proc_args.verbose_level).context("failed to setup logger")?;

    let configs = g3relay::config::load(&proc_args.config_file).context(format!(
        "failed to load config file {}",
        proc_args.config_file.display()
    ))?;
    debug!(
        "loaded {} relays from {}",
        configs.len(),
        proc_args.config_file.display()
    );

    if proc_args.test_config {
        info!("the format of the config file is ok");
        return Ok(());
    }

    match tokio_run(configs) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{e:?}");
            Err(e)
        }
    }
}

fn tokio_run(configs: Vec<RelayConfig>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name(g3relay::PKG_NAME)
        .build()
        .context("failed to start runtime")?;
    rt.block_on(async {
        let cmgr: ArcConnectionManager = Arc::new(MemoryConnectionManager::default());
        let cancel = CancellationToken::new();

        let tasks = g3relay::serve::spawn_all(configs, cmgr, cancel.clone())
            .await
            .context("failed to spawn all relays")?;
        info!("{} {} started", g3relay::PKG_NAME, g3relay::PKG_VERSION);

        tokio::signal::ctrl_c()
            .await
            .context("failed to wait for ctrl-c")?;
        info!("received ctrl-c, stopping all relays");
        cancel.cancel();

        for task in tasks {
            if let Err(e) = task.await {
                warn!("relay task exited abnormally: {e}");
            }
        }
        Ok(())
    })
}
