/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

use super::value;
use crate::sniff::{PROTOCOL_HTTP, PROTOCOL_TLS};

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_SNIFF_TIMEOUT: Duration = Duration::from_millis(300);

/// Per relay tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayOptions {
    /// 0 means no limit
    pub max_connection: usize,
    /// 0 means no limit
    pub max_read_rate_kbps: u64,
    pub sniff_timeout: Duration,
    pub blocked_protocols: Vec<String>,
    pub enable_multipath_tcp: bool,
    pub dial_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub health_check_interval: Option<Duration>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        RelayOptions {
            max_connection: 0,
            max_read_rate_kbps: 0,
            sniff_timeout: DEFAULT_SNIFF_TIMEOUT,
            blocked_protocols: Vec::new(),
            enable_multipath_tcp: false,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            idle_timeout: None,
            health_check_interval: None,
        }
    }
}

impl RelayOptions {
    pub(crate) fn parse(map: &yaml::Hash) -> anyhow::Result<Self> {
        let mut options = RelayOptions::default();
        value::foreach_kv(map, |k, v| options.set(k, v))?;
        options.check()?;
        Ok(options)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match value::normalize_key(k).as_str() {
            "max_connection" => {
                self.max_connection =
                    value::as_usize(v).context(format!("invalid usize value for key {k}"))?;
                Ok(())
            }
            "max_read_rate_kbps" => {
                self.max_read_rate_kbps =
                    value::as_u64(v).context(format!("invalid u64 value for key {k}"))?;
                Ok(())
            }
            "sniff_timeout" => {
                self.sniff_timeout = value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "blocked_protocols" => {
                self.blocked_protocols = value::as_list(v, value::as_string)
                    .context(format!("invalid protocol name list value for key {k}"))?
                    .into_iter()
                    .map(|s| s.to_lowercase())
                    .collect();
                Ok(())
            }
            "enable_multipath_tcp" | "enable_mptcp" => {
                self.enable_multipath_tcp = value::as_bool(v)?;
                Ok(())
            }
            "dial_timeout" => {
                self.dial_timeout = value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "idle_timeout" => {
                let timeout = value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
                Ok(())
            }
            "health_check_interval" => {
                let interval = value::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                self.health_check_interval = (!interval.is_zero()).then_some(interval);
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&mut self) -> anyhow::Result<()> {
        if self.dial_timeout.is_zero() {
            return Err(anyhow!("dial timeout should not be zero"));
        }
        for p in &self.blocked_protocols {
            match p.as_str() {
                PROTOCOL_TLS | PROTOCOL_HTTP => {}
                _ => return Err(anyhow!("unsupported protocol {p} to block")),
            }
        }
        if !self.blocked_protocols.is_empty() && self.sniff_timeout.is_zero() {
            self.sniff_timeout = DEFAULT_SNIFF_TIMEOUT;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn parse(s: &str) -> anyhow::Result<RelayOptions> {
        let doc = YamlLoader::load_from_str(s).unwrap().remove(0);
        RelayOptions::parse(doc.as_hash().unwrap())
    }

    #[test]
    fn full() {
        let options = parse(
            r#"
max_connection: 100
max-read-rate-kbps: "800"
sniff_timeout: 500ms
blocked_protocols: [TLS, http]
enable_multipath_tcp: true
dial_timeout: 5
idle_timeout: 1m
"#,
        )
        .unwrap();
        assert_eq!(options.max_connection, 100);
        assert_eq!(options.max_read_rate_kbps, 800);
        assert_eq!(options.sniff_timeout, Duration::from_millis(500));
        assert_eq!(options.blocked_protocols, ["tls", "http"]);
        assert!(options.enable_multipath_tcp);
        assert_eq!(options.dial_timeout, Duration::from_secs(5));
        assert_eq!(options.idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.health_check_interval, None);
    }

    #[test]
    fn invalid() {
        assert!(parse("max_conn: 1").is_err());
        assert!(parse("dial_timeout: 0").is_err());
        assert!(parse("blocked_protocols: bittorrent").is_err());
        assert!(parse("max_connection: -1").is_err());
    }
}
