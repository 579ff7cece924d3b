//! Parsing of `docker inspect` output.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike as _, Utc};
use serde::Deserialize;

use super::{ContainerInfo, PortBinding};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    name: String,
    #[serde(default)]
    config: Option<InspectConfig>,
    state: InspectState,
    #[serde(default)]
    network_settings: Option<InspectNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    #[serde(default)]
    exit_code: Option<i64>,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetwork {
    #[serde(default)]
    ports: Option<BTreeMap<String, Option<Vec<InspectHostPort>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHostPort {
    #[serde(default)]
    host_ip: String,
    host_port: String,
}

/// The runtime reports "0001-01-01T00:00:00Z" for containers that never started.
fn parse_started_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw?).ok()?.with_timezone(&Utc);
    (ts.year() > 1).then_some(ts)
}

fn parse_ports(ports: BTreeMap<String, Option<Vec<InspectHostPort>>>) -> Vec<PortBinding> {
    let mut bindings: Vec<PortBinding> = Vec::new();

    for (key, hosts) in ports {
        let (port, protocol) = key.split_once('/').unwrap_or((key.as_str(), "tcp"));
        let Ok(container_port) = port.parse::<u16>() else {
            log::debug!("Skipping unparsable port key {:?}", key);
            continue;
        };

        for host in hosts.unwrap_or_default() {
            let Ok(host_port) = host.host_port.parse::<u16>() else {
                continue;
            };
            // IPv4 and IPv6 listeners show up as separate entries for the same port.
            let duplicate = bindings
                .iter()
                .any(|b| b.container_port == container_port && b.host_port == host_port);
            if !duplicate {
                bindings.push(PortBinding {
                    container_port,
                    protocol: protocol.to_string(),
                    host_ip: host.host_ip,
                    host_port,
                });
            }
        }
    }

    bindings
}

/// Parse the JSON array printed by `docker inspect <name>`.
pub fn parse_inspect(raw: &str) -> Result<Option<ContainerInfo>> {
    let entries: Vec<InspectEntry> = serde_json::from_str(raw)?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(None);
    };

    if entry.id.is_empty() {
        return Err(AppError::runtime("inspect output has no container id"));
    }

    Ok(Some(ContainerInfo {
        id: entry.id,
        name: entry.name.trim_start_matches('/').to_string(),
        image: entry.config.map(|c| c.image).unwrap_or_default(),
        health: entry.state.health.map(|h| h.status),
        exit_code: entry.state.exit_code,
        started_at: parse_started_at(entry.state.started_at.as_deref()),
        state: entry.state.status,
        ports: entry
            .network_settings
            .and_then(|n| n.ports)
            .map(parse_ports)
            .unwrap_or_default(),
    }))
}
