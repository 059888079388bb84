/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, Interval};

use crate::relay::{RelayError, RelayResult};
use crate::stat::ConnStats;

const COPY_BUFFER_SIZE: usize = 16 * 1024;

enum CopyError {
    ReadFailed(io::Error),
    WriteFailed(io::Error),
}

async fn copy_half<R, W, F>(
    mut reader: R,
    mut writer: W,
    active: &AtomicBool,
    record: F,
) -> Result<(), CopyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Fn(u64),
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let nr = reader
            .read(&mut buf)
            .await
            .map_err(CopyError::ReadFailed)?;
        if nr == 0 {
            writer.shutdown().await.map_err(CopyError::WriteFailed)?;
            return Ok(());
        }
        writer
            .write_all(&buf[..nr])
            .await
            .map_err(CopyError::WriteFailed)?;
        writer.flush().await.map_err(CopyError::WriteFailed)?;
        active.store(true, Ordering::Relaxed);
        record(nr as u64);
    }
}

async fn idle_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Copy data between `client` and `remote` until both directions are done.
///
/// When one direction reaches EOF the write side of its peer is shut down and
/// the other direction keeps going. If `idle_timeout` is set and no data moves
/// in either direction for that long, the flow ends with an idle error.
pub async fn transit<C, R>(
    client: C,
    remote: R,
    stats: &ConnStats,
    idle_timeout: Option<Duration>,
) -> RelayResult<()>
where
    C: AsyncRead + AsyncWrite,
    R: AsyncRead + AsyncWrite,
{
    let (clt_r, clt_w) = tokio::io::split(client);
    let (ups_r, ups_w) = tokio::io::split(remote);

    let clt_active = AtomicBool::new(false);
    let ups_active = AtomicBool::new(false);

    let clt_to_ups = copy_half(clt_r, ups_w, &clt_active, |n| stats.record_traffic(0, n));
    let ups_to_clt = copy_half(ups_r, clt_w, &ups_active, |n| stats.record_traffic(n, 0));
    tokio::pin!(clt_to_ups);
    tokio::pin!(ups_to_clt);

    let mut idle_interval =
        idle_timeout.map(|d| tokio::time::interval_at(Instant::now() + d, d));

    let mut clt_done = false;
    let mut ups_done = false;
    loop {
        tokio::select! {
            biased;

            r = &mut clt_to_ups, if !clt_done => {
                match r {
                    Ok(_) => clt_done = true,
                    Err(CopyError::ReadFailed(e)) => return Err(RelayError::ClientReadFailed(e)),
                    Err(CopyError::WriteFailed(e)) => return Err(RelayError::RemoteWriteFailed(e)),
                }
            }
            r = &mut ups_to_clt, if !ups_done => {
                match r {
                    Ok(_) => ups_done = true,
                    Err(CopyError::ReadFailed(e)) => return Err(RelayError::RemoteReadFailed(e)),
                    Err(CopyError::WriteFailed(e)) => return Err(RelayError::ClientWriteFailed(e)),
                }
            }
            _ = idle_tick(&mut idle_interval) => {
                let clt_moved = clt_active.swap(false, Ordering::Relaxed);
                let ups_moved = ups_active.swap(false, Ordering::Relaxed);
                if !clt_moved && !ups_moved {
                    return Err(RelayError::Idle(idle_timeout.unwrap_or_default()));
                }
            }
        }

        if clt_done && ups_done {
            return Ok(());
        }
    }
}
