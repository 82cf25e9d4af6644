//! Configuration management for Omnicast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub facebook: Option<FacebookConfig>,
    pub instagram: Option<InstagramConfig>,
    pub youtube: Option<YoutubeConfig>,
    pub twitter: Option<TwitterConfig>,
    pub linkedin: Option<LinkedinConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Scheduler loop and dispatch policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-post scans
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Per-account dispatch timeout in seconds
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout: u64,
    /// Extra attempts after a transient failure (0 = no retry)
    #[serde(default)]
    pub max_retries: u32,
    /// Base delay in seconds for retry backoff (doubles per attempt)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_dispatch_timeout() -> u64 {
    120
}

fn default_retry_delay() -> u64 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            dispatch_timeout: default_dispatch_timeout(),
            max_retries: 0,
            retry_delay: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub enabled: bool,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub enabled: bool,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

fn default_graph_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    pub enabled: bool,
    #[serde(default = "default_youtube_upload_base")]
    pub upload_base: String,
}

fn default_youtube_upload_base() -> String {
    "https://www.googleapis.com/upload/youtube/v3".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub enabled: bool,
    #[serde(default = "default_twitter_api_base")]
    pub api_base: String,
    #[serde(default = "default_twitter_upload_base")]
    pub upload_base: String,
}

fn default_twitter_api_base() -> String {
    "https://api.twitter.com/2".to_string()
}

fn default_twitter_upload_base() -> String {
    "https://upload.twitter.com/1.1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedinConfig {
    pub enabled: bool,
    #[serde(default = "default_linkedin_api_base")]
    pub api_base: String,
}

fn default_linkedin_api_base() -> String {
    "https://api.linkedin.com/v2".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration with every platform enabled
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/omnicast/posts.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            facebook: Some(FacebookConfig {
                enabled: true,
                graph_base: default_graph_base(),
            }),
            instagram: Some(InstagramConfig {
                enabled: true,
                graph_base: default_graph_base(),
            }),
            youtube: Some(YoutubeConfig {
                enabled: true,
                upload_base: default_youtube_upload_base(),
            }),
            twitter: Some(TwitterConfig {
                enabled: true,
                api_base: default_twitter_api_base(),
                upload_base: default_twitter_upload_base(),
            }),
            linkedin: Some(LinkedinConfig {
                enabled: true,
                api_base: default_linkedin_api_base(),
            }),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("OMNICAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("omnicast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("omnicast"))
}
