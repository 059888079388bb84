/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

use super::RelayOptions;
use super::value;
use crate::lb::RemoteNode;
use crate::transport::TransportType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub label: String,
    pub listen: Option<SocketAddr>,
    pub listen_type: TransportType,
    pub transport_type: TransportType,
    pub tcp_remotes: Vec<RemoteNode>,
    pub udp_remotes: Vec<RemoteNode>,
    pub options: Arc<RelayOptions>,
}

impl RelayConfig {
    pub fn new(label: impl Into<String>) -> Self {
        RelayConfig {
            label: label.into(),
            listen: None,
            listen_type: TransportType::Raw,
            transport_type: TransportType::Raw,
            tcp_remotes: Vec::new(),
            udp_remotes: Vec::new(),
            options: Arc::new(RelayOptions::default()),
        }
    }

    pub(crate) fn parse(map: &yaml::Hash) -> anyhow::Result<Self> {
        let mut config = RelayConfig::new(String::new());
        value::foreach_kv(map, |k, v| config.set(k, v))?;
        config.check()?;
        Ok(config)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match value::normalize_key(k).as_str() {
            "label" | "name" => {
                self.label = value::as_string(v)?;
                Ok(())
            }
            "listen" => {
                let addr = value::as_socket_addr(v)
                    .context(format!("invalid socket address value for key {k}"))?;
                self.listen = Some(addr);
                Ok(())
            }
            "listen_type" => {
                self.listen_type = as_transport_type(v)?;
                Ok(())
            }
            "transport_type" => {
                self.transport_type = as_transport_type(v)?;
                Ok(())
            }
            "tcp_remotes" | "remotes" => {
                self.tcp_remotes = value::as_list(v, value::as_remote_node)
                    .context(format!("invalid remote node list value for key {k}"))?;
                Ok(())
            }
            "udp_remotes" => {
                self.udp_remotes = value::as_list(v, value::as_remote_node)
                    .context(format!("invalid remote node list value for key {k}"))?;
                Ok(())
            }
            "options" => {
                if let Yaml::Hash(map) = v {
                    let options = RelayOptions::parse(map)
                        .context(format!("invalid relay options value for key {k}"))?;
                    self.options = Arc::new(options);
                    Ok(())
                } else {
                    Err(anyhow!("yaml value type for key {k} should be 'map'"))
                }
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&mut self) -> anyhow::Result<()> {
        if self.label.is_empty() {
            return Err(anyhow!("label is not set"));
        }
        if self.listen.is_none() {
            return Err(anyhow!("listen address is not set"));
        }
        if self.tcp_remotes.is_empty() && self.udp_remotes.is_empty() {
            return Err(anyhow!("no tcp or udp remotes set"));
        }
        Ok(())
    }
}

fn as_transport_type(v: &Yaml) -> anyhow::Result<TransportType> {
    let s = value::as_string(v)?;
    TransportType::from_str(&s).map_err(|_| anyhow!("invalid transport type {s}"))
}
