// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server and client configuration
//!
//! Defaults, optionally overlaid by a TOML file with `[server]` and
//! `[client]` tables, then by `COMPUTE_*` environment variables.

use crate::keystore::TRUSTED_INTERMEDIARY;
use crate::protocol::DEFAULT_MAX_FRAME_BYTES;
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "COMPUTE_CONFIG";
pub const DEFAULT_PORT: u16 = 8888;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub io_timeout_secs: u64,
    /// Session keys never expire when unset
    pub session_ttl_secs: Option<u64>,
    pub max_connections: usize,
    pub max_frame_bytes: usize,
    /// Uploaded artifacts are kept in memory only when unset
    pub artifact_dir: Option<PathBuf>,
    pub keyring: PathBuf,
    pub replay_window_secs: u64,
    pub key_cleanup_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            io_timeout_secs: 30,
            session_ttl_secs: None,
            max_connections: 256,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            artifact_dir: Some(PathBuf::from("artifacts")),
            keyring: PathBuf::from("keys/centre.toml"),
            replay_window_secs: 3600,
            key_cleanup_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load the `[server]` table of a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_section(path.as_ref(), "server")
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// File named by `COMPUTE_CONFIG` (if any), then environment overrides
    pub fn load() -> Result<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup("COMPUTE_HOST") {
            self.host = host;
        }
        override_parsed(&lookup, "COMPUTE_PORT", &mut self.port);
        override_parsed(&lookup, "COMPUTE_IO_TIMEOUT_SECS", &mut self.io_timeout_secs);
        override_parsed(&lookup, "COMPUTE_MAX_CONNECTIONS", &mut self.max_connections);
        if let Some(val) = lookup("COMPUTE_SESSION_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(0) => self.session_ttl_secs = None,
                Ok(secs) => self.session_ttl_secs = Some(secs),
                Err(_) => invalid_override("COMPUTE_SESSION_TTL_SECS", &val),
            }
        }
        if let Some(dir) = lookup("COMPUTE_ARTIFACT_DIR") {
            self.artifact_dir = if dir.is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        if let Some(path) = lookup("COMPUTE_KEYRING") {
            self.keyring = PathBuf::from(path);
        }
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.map(Duration::from_secs)
    }

    pub fn replay_window(&self) -> Duration {
        Duration::from_secs(self.replay_window_secs)
    }

    pub fn key_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.key_cleanup_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: String,
    pub intermediary: String,
    pub connect_timeout_secs: u64,
    pub io_timeout_secs: u64,
    pub max_frame_bytes: usize,
    pub keyring: PathBuf,
    /// Local source for artifacts the server asks for
    pub artifact_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            intermediary: TRUSTED_INTERMEDIARY.to_string(),
            connect_timeout_secs: 10,
            io_timeout_secs: 30,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            keyring: PathBuf::from("keys/client.toml"),
            artifact_dir: PathBuf::from("artifacts"),
        }
    }
}

impl ClientConfig {
    /// Load the `[client]` table of a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_section(path.as_ref(), "client")
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn load() -> Result<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("COMPUTE_SERVER_ADDR") {
            self.server_addr = addr;
        }
        if let Some(name) = lookup("COMPUTE_INTERMEDIARY") {
            self.intermediary = name;
        }
        override_parsed(&lookup, "COMPUTE_IO_TIMEOUT_SECS", &mut self.io_timeout_secs);
        if let Some(path) = lookup("COMPUTE_KEYRING") {
            self.keyring = PathBuf::from(path);
        }
        if let Some(dir) = lookup("COMPUTE_ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

fn load_section<T: DeserializeOwned + Default>(path: &Path, section: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let value: toml::Value = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;

    match value.get(section) {
        Some(table) => table
            .clone()
            .try_into()
            .with_context(|| format!("Invalid [{}] section in {:?}", section, path)),
        None => Ok(T::default()),
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(val) = lookup(key) {
        match val.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => invalid_override(key, &val),
        }
    }
}

fn invalid_override(key: &str, val: &str) {
    tracing::warn!("⚠️  Ignoring invalid {}={:?}", key, val);
}
