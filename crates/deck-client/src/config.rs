//! `config.toml` loading.
//!
//! Lookup order: explicit `--config` path, then
//! `<config dir>/agentdeck/config.toml`, then built-in defaults.
//! `AGENTDECK_SERVER_URL` and `AGENTDECK_ADMIN_TOKEN` override the
//! default server afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use deck_graph::LayoutConfig;
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_TTL_SECS;
use crate::error::ClientError;
use crate::token::{AdminToken, ADMIN_TOKEN_ENV};

pub const SERVER_URL_ENV: &str = "AGENTDECK_SERVER_URL";
pub const DEFAULT_SERVER_ID: &str = "local";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

pub const MIN_POLL_SECS: u64 = 5;
pub const MAX_POLL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<AdminToken>,
}

impl ServerConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub graph_interval_secs: u64,
    pub tables_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            graph_interval_secs: 10,
            tables_interval_secs: 5,
            request_timeout_secs: 15,
        }
    }
}

impl PollSettings {
    pub fn graph_interval(&self) -> Duration {
        clamp_poll(self.graph_interval_secs)
    }

    pub fn tables_interval(&self) -> Duration {
        clamp_poll(self.tables_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn clamp_poll(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_POLL_SECS, MAX_POLL_SECS))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Log file used while the console owns the terminal.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub default_server: Option<String>,
    pub servers: Vec<ServerConfig>,
    pub poll: PollSettings,
    pub cache: CacheSettings,
    pub layout: LayoutConfig,
    pub log: LogSettings,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            default_server: None,
            servers: vec![ServerConfig::new(DEFAULT_SERVER_ID, DEFAULT_SERVER_URL)],
            poll: PollSettings::default(),
            cache: CacheSettings::default(),
            layout: LayoutConfig::default(),
            log: LogSettings::default(),
        }
    }
}

impl DeckConfig {
    /// Load, apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ClientError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_overrides(
            std::env::var(SERVER_URL_ENV).ok(),
            AdminToken::from_env(),
        );
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), servers = config.servers.len(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ClientError> {
        let mut config: DeckConfig =
            toml::from_str(contents).map_err(|e| ClientError::Config(e.to_string()))?;
        if config.servers.is_empty() {
            config
                .servers
                .push(ServerConfig::new(DEFAULT_SERVER_ID, DEFAULT_SERVER_URL));
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ClientError> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Environment values win over the file for the default server.
    pub fn apply_overrides(&mut self, url: Option<String>, token: Option<AdminToken>) {
        let url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        if url.is_none() && token.is_none() {
            return;
        }
        let index = self.default_server_index().unwrap_or(0);
        if self.servers.is_empty() {
            self.servers
                .push(ServerConfig::new(DEFAULT_SERVER_ID, DEFAULT_SERVER_URL));
        }
        let server = &mut self.servers[index];
        if let Some(url) = url {
            tracing::debug!(server = %server.id, env = SERVER_URL_ENV, "Server URL overridden");
            server.url = url;
        }
        if let Some(token) = token {
            tracing::debug!(server = %server.id, env = ADMIN_TOKEN_ENV, "Admin token overridden");
            server.admin_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err(ClientError::Config("server id must not be empty".into()));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(ClientError::Config(format!(
                    "duplicate server id '{}'",
                    server.id
                )));
            }
            if !(server.url.starts_with("http://") || server.url.starts_with("https://")) {
                return Err(ClientError::Config(format!(
                    "server '{}' url must start with http:// or https://, got '{}'",
                    server.id, server.url
                )));
            }
        }
        if let Some(default) = &self.default_server {
            if !seen.contains(default.as_str()) {
                return Err(ClientError::Config(format!(
                    "default_server '{default}' is not a configured server"
                )));
            }
        }
        Ok(())
    }

    /// The named server, else `default_server`, else the first one.
    pub fn server(&self, id: Option<&str>) -> Result<&ServerConfig, ClientError> {
        match id {
            Some(id) => self
                .servers
                .iter()
                .find(|s| s.id == id)
                .ok_or_else(|| ClientError::Config(format!("unknown server '{id}'"))),
            None => self
                .default_server_index()
                .and_then(|i| self.servers.get(i))
                .ok_or_else(|| ClientError::Config("no servers configured".into())),
        }
    }

    fn default_server_index(&self) -> Option<usize> {
        match &self.default_server {
            Some(id) => self.servers.iter().position(|s| &s.id == id),
            None if self.servers.is_empty() => None,
            None => Some(0),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("agentdeck").join("config.toml"))
}

/// Directory for prefs and the console log file.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agentdeck")
}
