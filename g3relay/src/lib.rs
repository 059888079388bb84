/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

pub mod cmgr;
pub mod config;
pub mod conn;
pub mod io;
pub mod lb;
pub mod log;
pub mod opts;
pub mod relay;
pub mod serve;
pub mod sniff;
pub mod stat;
pub mod transport;

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
