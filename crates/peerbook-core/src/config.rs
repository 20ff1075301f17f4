//! Configuration system for Peerbook.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PEERBOOK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/peerbook/config.toml
//!   3. ~/.config/peerbook/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::identity::EqualityStrategy;
use crate::node::{NodeRoles, ServiceIdentifier};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerbookConfig {
    pub registry: RegistryConfig,
    pub bans: BanConfig,
    pub network: NetworkConfig,
    /// Services that need connection slots to peers with matching roles.
    pub services: Vec<ServiceConfig>,
    /// Operator-pinned peers, added as `Static` and never evicted.
    pub static_nodes: Vec<StaticNodeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Max records in the registry. Absent = unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
    pub equality_strategy: EqualityStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanConfig {
    pub default_ban_duration_secs: u64,
    pub max_banned_nodes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Dotted IPv4 prefixes treated as the local network, e.g. "192.168".
    /// Inbound peers from these hosts are recorded as 127.0.0.1.
    pub local_networks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: ServiceIdentifier,
    #[serde(default)]
    pub roles: NodeRoles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticNodeConfig {
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_static_roles")]
    pub roles: NodeRoles,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_PORT: u16 = 7900;

pub const DEFAULT_BAN_DURATION_SECS: u64 = 12 * 60 * 60;

pub const DEFAULT_MAX_BANNED_NODES: usize = 5_000;

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            default_ban_duration_secs: DEFAULT_BAN_DURATION_SECS,
            max_banned_nodes: DEFAULT_MAX_BANNED_NODES,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_static_roles() -> NodeRoles {
    NodeRoles::PEER
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("peerbook")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PeerbookConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            PeerbookConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PEERBOOK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&PeerbookConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply PEERBOOK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("PEERBOOK_REGISTRY__MAX_NODES") {
            if let Ok(n) = v.parse() {
                self.registry.max_nodes = Some(n);
            }
        }
        if let Some(v) = var("PEERBOOK_BANS__DEFAULT_BAN_DURATION_SECS") {
            if let Ok(secs) = v.parse() {
                self.bans.default_ban_duration_secs = secs;
            }
        }
        if let Some(v) = var("PEERBOOK_BANS__MAX_BANNED_NODES") {
            if let Ok(n) = v.parse() {
                self.bans.max_banned_nodes = n;
            }
        }
        if let Some(v) = var("PEERBOOK_NETWORK__LOCAL_NETWORKS") {
            self.network.local_networks = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }
}
