//! Configuration for the bot
//!
//! Settings are read from TOML. Missing sections fall back to defaults, and
//! the `DISCORD_TOKEN` environment variable wins over a token in the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::DatabaseConfig;
use crate::{CoreError, Result};

pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub wizard: WizardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Register slash commands on one guild instead of globally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,

    /// Forum or text channel that holds each author's character thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_channel: Option<u64>,

    #[serde(default = "default_webhook_name")]
    pub npc_webhook_name: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            guild_id: None,
            submission_channel: None,
            npc_webhook_name: default_webhook_name(),
        }
    }
}

fn default_webhook_name() -> String {
    "ocdex".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Seconds a prompt waits for input before the wizard times out
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    600
}

impl BotConfig {
    /// Apply environment overrides
    pub fn with_env(mut self) -> Self {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.discord.token = Some(token);
            }
        }
        self
    }

    pub fn token(&self) -> Result<&str> {
        self.discord
            .token
            .as_deref()
            .ok_or_else(|| CoreError::ConfigurationError {
                config_path: "environment".to_string(),
                field: "discord.token".to_string(),
                expected: "bot token".to_string(),
                cause: format!("set {TOKEN_ENV} or discord.token").into(),
            })
    }
}

pub async fn load_config(path: &Path) -> Result<BotConfig> {
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: path.display().to_string(),
                field: "file".to_string(),
                expected: "readable TOML file".to_string(),
                cause: Box::new(e),
            })?;

    toml::from_str(&content).map_err(|e| CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: "content".to_string(),
        expected: "valid TOML configuration".to_string(),
        cause: Box::new(e),
    })
}

pub async fn save_config(config: &BotConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::ConfigurationError {
                config_path: parent.display().to_string(),
                field: "directory".to_string(),
                expected: "writable directory".to_string(),
                cause: Box::new(e),
            })?;
    }

    // Never write the token back out
    let mut config = config.clone();
    config.discord.token = None;

    let content = toml::to_string_pretty(&config).map_err(|e| CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: "serialization".to_string(),
        expected: "serializable config structure".to_string(),
        cause: Box::new(e),
    })?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| CoreError::ConfigurationError {
            config_path: path.display().to_string(),
            field: "file".to_string(),
            expected: "writable file location".to_string(),
            cause: Box::new(e),
        })
}

pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("ocdex.toml")];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("ocdex").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".ocdex").join("config.toml"));
    }

    paths
}

/// First config found in [`config_paths`], or the defaults
pub async fn load_config_from_standard_locations() -> Result<BotConfig> {
    for path in config_paths() {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            return load_config(&path).await;
        }
    }

    Ok(BotConfig::default())
}
