/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use yaml_rust::{Yaml, yaml};

use crate::lb::RemoteNode;

pub(crate) fn normalize_key(s: &str) -> String {
    s.to_lowercase().replace('-', "_")
}

pub(crate) fn foreach_kv<F>(map: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in map.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

pub(crate) fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Real(s) => Ok(s.to_string()),
        _ => Err(anyhow!(
            "yaml value type for string should be 'string' / 'integer' / 'real'"
        )),
    }
}

pub(crate) fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

pub(crate) fn as_u64(v: &Yaml) -> anyhow::Result<u64> {
    match v {
        Yaml::String(s) => Ok(u64::from_str(s)?),
        Yaml::Integer(i) => Ok(u64::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'u64' should be 'string' or 'integer'"
        )),
    }
}

pub(crate) fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

/// Bare numbers are treated as seconds.
pub(crate) fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => {
                if let Ok(u) = u64::from_str(value) {
                    Ok(Duration::from_secs(u))
                } else if let Ok(f) = f64::from_str(value) {
                    Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
                } else {
                    Err(anyhow!("invalid duration string"))
                }
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            let u = u64::try_from(*value).map_err(|_| anyhow!("negative duration value"))?;
            Ok(Duration::from_secs(u))
        }
        Yaml::Real(s) => {
            let f = f64::from_str(s).map_err(|e| anyhow!("invalid f64 value: {e}"))?;
            Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string' or 'integer' or 'real'"
        )),
    }
}

pub(crate) fn as_socket_addr(v: &Yaml) -> anyhow::Result<SocketAddr> {
    match v {
        Yaml::String(s) => {
            SocketAddr::from_str(s).map_err(|e| anyhow!("invalid socket address {s}: {e}"))
        }
        Yaml::Integer(i) => {
            let port = u16::try_from(*i)?;
            Ok(SocketAddr::new(std::net::Ipv6Addr::UNSPECIFIED.into(), port))
        }
        _ => Err(anyhow!(
            "yaml value type for 'socket address' should be 'string' or 'integer'"
        )),
    }
}

fn check_remote_address(s: &str) -> anyhow::Result<()> {
    match s.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            u16::from_str(port).map_err(|e| anyhow!("invalid port in {s}: {e}"))?;
            Ok(())
        }
        _ => Err(anyhow!("remote address {s} should be in host:port format")),
    }
}

/// Accept `host:port` or a map with `address` and `label`.
pub(crate) fn as_remote_node(v: &Yaml) -> anyhow::Result<RemoteNode> {
    match v {
        Yaml::String(s) => {
            check_remote_address(s)?;
            Ok(RemoteNode::with_address(s.as_str()))
        }
        Yaml::Hash(map) => {
            let mut address = String::new();
            let mut label = String::new();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "address" | "addr" => {
                    address = as_string(v)?;
                    Ok(())
                }
                "label" | "name" => {
                    label = as_string(v)?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            if address.is_empty() {
                return Err(anyhow!("no address set for the remote"));
            }
            check_remote_address(&address)?;
            if label.is_empty() {
                Ok(RemoteNode::with_address(address))
            } else {
                Ok(RemoteNode::new(address, label))
            }
        }
        _ => Err(anyhow!(
            "yaml value type for 'remote node' should be 'string' or 'map'"
        )),
    }
}

pub(crate) fn as_list<T, F>(v: &Yaml, convert: F) -> anyhow::Result<Vec<T>>
where
    F: Fn(&Yaml) -> anyhow::Result<T>,
{
    match v {
        Yaml::Array(seq) => {
            let mut list = Vec::with_capacity(seq.len());
            for (i, v) in seq.iter().enumerate() {
                let node = convert(v).context(format!("invalid value for #{i}"))?;
                list.push(node);
            }
            Ok(list)
        }
        _ => Ok(vec![convert(v)?]),
    }
}
