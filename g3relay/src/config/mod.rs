/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, YamlLoader, yaml};

mod value;

mod options;
pub use options::{DEFAULT_DIAL_TIMEOUT, DEFAULT_SNIFF_TIMEOUT, RelayOptions};

mod relay;
pub use relay::RelayConfig;

/// Load all relay configs from a yaml file, multiple docs are merged.
pub fn load(path: &Path) -> anyhow::Result<Vec<RelayConfig>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {e}", path.display()))?;
    load_str(&content).context(format!("invalid config file {}", path.display()))
}

pub fn load_str(content: &str) -> anyhow::Result<Vec<RelayConfig>> {
    let docs =
        YamlLoader::load_from_str(content).map_err(|e| anyhow!("invalid yaml content: {e}"))?;

    let mut relays = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        match doc {
            Yaml::Hash(map) => {
                load_doc(map, &mut relays).context(format!("failed to load doc #{i}"))?
            }
            _ => return Err(anyhow!("yaml doc root should be hash")),
        }
    }

    for (i, a) in relays.iter().enumerate() {
        if relays[..i].iter().any(|b| b.label == a.label) {
            return Err(anyhow!("duplicate relay label {}", a.label));
        }
    }
    Ok(relays)
}

fn load_doc(map: &yaml::Hash, relays: &mut Vec<RelayConfig>) -> anyhow::Result<()> {
    value::foreach_kv(map, |k, v| match value::normalize_key(k).as_str() {
        "relay_configs" | "relays" | "relay" => load_relays(v, relays),
        _ => Err(anyhow!("invalid key {k} in main conf")),
    })
}

fn load_relays(v: &Yaml, relays: &mut Vec<RelayConfig>) -> anyhow::Result<()> {
    match v {
        Yaml::Hash(map) => {
            relays.push(RelayConfig::parse(map)?);
            Ok(())
        }
        Yaml::Array(seq) => {
            for (i, v) in seq.iter().enumerate() {
                let Yaml::Hash(map) = v else {
                    return Err(anyhow!("relay config #{i} should be a map"));
                };
                let relay = RelayConfig::parse(map).context(format!("invalid relay config #{i}"))?;
                relays.push(relay);
            }
            Ok(())
        }
        _ => Err(anyhow!("invalid value type for relay configs")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_doc() {
        let relays = load_str(
            r#"
relays:
  - label: a
    listen: 127.0.0.1:10001
    tcp_remotes: 127.0.0.1:20001
---
relay:
  label: b
  listen: 127.0.0.1:10002
  udp_remotes: 127.0.0.1:20002
"#,
        )
        .unwrap();
        assert_eq!(relays.len(), 2);
        assert_eq!(relays[0].label, "a");
        assert_eq!(relays[1].udp_remotes[0].address, "127.0.0.1:20002");
    }

    #[test]
    fn duplicate_label() {
        let r = load_str(
            r#"
relays:
  - label: a
    listen: 127.0.0.1:10001
    tcp_remotes: 127.0.0.1:20001
  - label: a
    listen: 127.0.0.1:10002
    tcp_remotes: 127.0.0.1:20001
"#,
        );
        assert!(r.is_err());
    }

    #[test]
    fn invalid_root() {
        assert!(load_str("- a\n- b").is_err());
        assert!(load_str("server: {}").is_err());
    }
}
