use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};

use crate::db::ConnectionTarget;
use crate::llm::openai::ModelEndpoint;
use crate::llm::ModelSelector;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    // Note: password is not saved for security reasons
}

impl ConnectionProfile {
    pub fn new(name: String) -> Self {
        Self {
            name,
            host: "localhost".to_string(),
            port: "5432".to_string(),
            database: "postgres".to_string(),
            user: "postgres".to_string(),
        }
    }

    pub fn to_target(&self, password: &str) -> Result<ConnectionTarget> {
        let port: u16 = self
            .port
            .parse()
            .with_context(|| format!("Invalid port '{}' in profile '{}'", self.port, self.name))?;
        Ok(ConnectionTarget {
            host: self.host.clone(),
            port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: password.to_string(),
        })
    }

    /// Profiles are the same connection when everything but the name matches.
    pub fn same_target(&self, other: &ConnectionProfile) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.database == other.database
            && self.user == other.user
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub selector: ModelSelector,
    pub endpoints: Vec<ModelEndpoint>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            selector: ModelSelector::default(),
            endpoints: vec![ModelEndpoint::openai_default()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Log file; defaults to the user data directory.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connections: Vec<ConnectionProfile>,
    pub llm: LlmSettings,
    pub log: LogSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("sqlpilot");
        path.push("config.json");
        Ok(path)
    }

    pub fn find_profile(&self, name: &str) -> Option<&ConnectionProfile> {
        self.connections.iter().find(|p| p.name == name)
    }

    /// Add `profile` unless an equivalent one is saved; returns whether it was added.
    pub fn remember(&mut self, profile: ConnectionProfile) -> bool {
        if self.connections.iter().any(|p| p.same_target(&profile)) {
            return false;
        }
        self.connections.push(profile);
        true
    }
}
