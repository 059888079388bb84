/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod conn;
pub use conn::{ConnStats, TrafficSnapshot};

mod metrics;
pub use metrics::{CONN_TYPE_TCP, CONN_TYPE_UDP, GaugeGuard, RelayMetrics};

const BYTE_UNITS: &[&str] = &["", "K", "M", "G", "T", "P", "E"];

/// Render a byte count with 1024 based units, e.g. `1.2MB`.
pub fn pretty_byte_size(size: u64) -> String {
    let mut v = size as f64;
    for unit in BYTE_UNITS {
        if v < 1024.0 {
            return format!("{v:.1}{unit}B");
        }
        v /= 1024.0;
    }
    format!("{v:.1}ZB")
}
