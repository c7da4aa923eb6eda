use std::{collections::BTreeMap, fs, io, path::Path};

use anyhow::Context;
use client_core::{EngineOptions, ServerConfig};
use serde::Deserialize;
use tracing::warn;

const ENV_PREFIX: &str = "CHAT__";
const DEFAULT_SERVER: &str = "matrix.org";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    options: EngineOptions,
    servers: BTreeMap<String, ServerConfig>,
}

#[derive(Debug, Default)]
pub struct Settings {
    pub options: EngineOptions,
    pub servers: Vec<ServerConfig>,
}

impl Settings {
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|server| server.name == name)
    }
}

/// Reads `path` (a missing file means defaults), then layers `CHAT__*`
/// environment overrides on top. With no servers configured a single
/// `matrix.org` entry is created.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file {}", path.display()))
        }
    };

    apply_overrides(&mut settings, std::env::vars());

    if settings.servers.is_empty() {
        settings.servers.push(ServerConfig::new(
            DEFAULT_SERVER,
            DEFAULT_SERVER,
            client_core::config::DEFAULT_PORT,
        ));
    }
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    let file: FileSettings = toml::from_str(raw).context("invalid chat config")?;
    let servers = file
        .servers
        .into_iter()
        .map(|(name, mut server)| {
            server.name = name;
            server
        })
        .collect();
    Ok(Settings {
        options: file.options,
        servers,
    })
}

/// Applies `CHAT__<OPTION>` and `CHAT__<SERVER>__<FIELD>` pairs. Names are
/// matched case-insensitively; unparsable values are logged and skipped.
pub fn apply_overrides<I>(settings: &mut Settings, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let applied = match rest.split_once("__") {
            Some((server, field)) => apply_server_override(settings, server, field, &value),
            None => apply_option_override(&mut settings.options, rest, &value),
        };
        if !applied {
            warn!(target: "chat::network", "config: ignoring override key={key}");
        }
    }
}

fn apply_option_override(options: &mut EngineOptions, field: &str, value: &str) -> bool {
    match field.to_ascii_lowercase().as_str() {
        "redactions" => set_parsed(&mut options.redactions, value),
        "max_initial_sync_events" => set_parsed(&mut options.max_initial_sync_events, value),
        "max_backlog_sync_events" => set_parsed(&mut options.max_backlog_sync_events, value),
        "sync_timeout_ms" => set_parsed(&mut options.sync_timeout_ms, value),
        "reconnect_unit_secs" => set_parsed(&mut options.reconnect_unit_secs, value),
        "tick_interval_ms" => set_parsed(&mut options.tick_interval_ms, value),
        "connect_timeout_secs" => set_parsed(&mut options.connect_timeout_secs, value),
        _ => false,
    }
}

fn apply_server_override(settings: &mut Settings, server: &str, field: &str, value: &str) -> bool {
    let Some(config) = settings
        .servers
        .iter_mut()
        .find(|config| config.name.eq_ignore_ascii_case(server))
    else {
        return false;
    };
    match field.to_ascii_lowercase().as_str() {
        "address" => {
            config.address = value.to_string();
            true
        }
        "user" => {
            config.user = value.to_string();
            true
        }
        "password" => {
            config.password = value.to_string();
            true
        }
        "device_name" => {
            config.device_name = value.to_string();
            true
        }
        "port" => set_parsed(&mut config.port, value),
        "verify_tls" => set_parsed(&mut config.verify_tls, value),
        "autoconnect" => set_parsed(&mut config.autoconnect, value),
        _ => false,
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
