use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroize;

use crate::{error::ConfigError, transport::Endpoint};

pub const DEFAULT_PORT: u16 = 8448;
pub const DEFAULT_DEVICE_NAME: &str = "chat_cli";

/// How a line is rewritten once a redaction for it arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    #[default]
    Strikethrough,
    Delete,
    Notice,
}

impl FromStr for RedactionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strikethrough" => Ok(Self::Strikethrough),
            "delete" => Ok(Self::Delete),
            "notice" => Ok(Self::Notice),
            other => Err(format!("unknown redaction mode {other:?}")),
        }
    }
}

/// Engine-wide knobs, read whenever a request is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub redactions: RedactionMode,
    pub max_initial_sync_events: u32,
    pub max_backlog_sync_events: u32,
    pub sync_timeout_ms: u64,
    pub reconnect_unit_secs: u64,
    pub pipeline_depth: usize,
    pub tick_interval_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            redactions: RedactionMode::Strikethrough,
            max_initial_sync_events: 30,
            max_backlog_sync_events: 10,
            sync_timeout_ms: 30_000,
            reconnect_unit_secs: 5,
            pipeline_depth: 1,
            tick_interval_ms: 1_000,
            connect_timeout_secs: 30,
        }
    }
}

impl EngineOptions {
    pub fn reconnect_unit(&self) -> Duration {
        Duration::from_secs(self.reconnect_unit_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    #[serde(default)]
    pub autoconnect: bool,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("device_name", &self.device_name)
            .field("verify_tls", &self.verify_tls)
            .field("autoconnect", &self.autoconnect)
            .finish()
    }
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            user: String::new(),
            password: String::new(),
            device_name: default_device_name(),
            verify_tls: true,
            autoconnect: false,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Checks what a connect attempt needs before touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() || self.port == 0 {
            return Err(ConfigError::MissingAddress);
        }
        if self.user.is_empty() || self.password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.address.trim(), self.port)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let address = format!("https://{}:{}/", self.address.trim(), self.port);
        Url::parse(&address).map_err(|source| ConfigError::InvalidAddress { address, source })
    }

    /// Wipes the stored password; used after the server denies a login.
    pub fn clear_password(&mut self) {
        self.password.zeroize();
    }

    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reports_missing_pieces() {
        let cfg = ServerConfig::new("home", "", DEFAULT_PORT);
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingAddress)));

        let cfg = ServerConfig::new("home", "chat.example.org", DEFAULT_PORT);
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingCredentials)));

        let cfg = cfg.with_credentials("alice", "hunter2");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn debug_output_hides_password() {
        let cfg = ServerConfig::new("home", "chat.example.org", 443).with_credentials("alice", "hunter2");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn clear_password_empties_secret() {
        let mut cfg = ServerConfig::new("home", "chat.example.org", 443).with_credentials("alice", "pw");
        cfg.clear_password();
        assert!(cfg.password.is_empty());
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn options_fill_defaults_for_missing_keys() {
        let opts: EngineOptions = serde_json::from_str(r#"{"redactions":"notice"}"#).expect("options");
        assert_eq!(opts.redactions, RedactionMode::Notice);
        assert_eq!(opts.pipeline_depth, 1);
        assert_eq!(opts.reconnect_unit(), Duration::from_secs(5));
    }

    #[test]
    fn redaction_mode_parses_case_insensitively() {
        assert_eq!("DELETE".parse::<RedactionMode>(), Ok(RedactionMode::Delete));
        assert!("shred".parse::<RedactionMode>().is_err());
    }
}
