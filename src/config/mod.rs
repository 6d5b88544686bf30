//! Application configuration.
//!
//! Loaded once at startup from a TOML file; the recorder core treats it as
//! read-only.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Streamer;
use crate::{Error, Result};

/// Settings for the rclone-backed upload service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcloneConfig {
    #[serde(default = "default_rclone_binary")]
    pub binary: String,
    /// Optional `--config` path handed to rclone.
    #[serde(default)]
    pub config_path: Option<String>,
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            binary: default_rclone_binary(),
            config_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Consecutive non-live polls tolerated before a session is considered
    /// over.
    #[serde(default = "default_max_retries")]
    pub max_download_retries: u32,
    /// Probe delay while a session is in progress.
    #[serde(default = "default_retry_delay")]
    pub download_retry_delay_seconds: u64,
    /// Capture engine binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default)]
    pub rclone: RcloneConfig,
    #[serde(default)]
    pub streamers: Vec<Streamer>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_download_retries: default_max_retries(),
            download_retry_delay_seconds: default_retry_delay(),
            ffmpeg_path: default_ffmpeg_path(),
            rclone: RcloneConfig::default(),
            streamers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Reads and validates a configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: AppConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for streamer in &self.streamers {
            if streamer.url.trim().is_empty() {
                return Err(Error::config(format!(
                    "streamer '{}' has an empty URL",
                    streamer.id
                )));
            }
            if !ids.insert(streamer.id.as_str()) {
                return Err(Error::config(format!(
                    "duplicate streamer id '{}'",
                    streamer.id
                )));
            }
        }
        Ok(())
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    10
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_rclone_binary() -> String {
    "rclone".to_string()
}
