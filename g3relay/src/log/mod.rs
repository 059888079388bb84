/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use slog::{Drain, slog_o};
use slog_scope::GlobalLoggerGuard;

mod stdio;
pub use stdio::{StdLogDrain, StdLogValue, new_async_logger};

const PROCESS_LOG_THREAD_NAME: &str = "log-process";
const LOG_CHANNEL_CAPACITY: usize = 1024;

/// Send all `log` records to the async stderr writer.
///
/// The returned guard should be held until the process exits.
pub fn setup(verbose_level: u8) -> Result<GlobalLoggerGuard, log::SetLoggerError> {
    let drain = new_async_logger(PROCESS_LOG_THREAD_NAME, LOG_CHANNEL_CAPACITY);
    let logger = slog::Logger::root(drain.fuse(), slog_o!());
    let scope_guard = slog_scope::set_global_logger(logger);

    let log_level = match verbose_level {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    slog_stdlog::init_with_level(log_level)?;
    Ok(scope_guard)
}
