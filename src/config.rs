use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::error::UploadClientError;

const CONFIG_DIR_NAME: &str = ".ufdr-upload";
const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_ID: &str = "cli-session";
pub const DEFAULT_PART_CONCURRENCY: usize = 3;
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 8 * 1024 * 1024 * 1024;

pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size_bytes: Option<u64>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            session_id: None,
            part_concurrency: None,
            max_file_size_bytes: None,
        }
    }
}

impl Config {
    pub fn default_api_url_value() -> &'static str {
        DEFAULT_API_URL
    }

    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_default();

        if let Some(api_url) = env_var("UFDR_API_URL") {
            config.api_url = api_url;
        }
        if let Some(session_id) = env_var("UFDR_SESSION_ID") {
            config.session_id = Some(session_id);
        }

        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Err(UploadClientError::ConfigNotFound.into());
        }

        let contents = fs::read_to_string(&config_path).context("Failed to read config file")?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    pub fn save_config(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid config path"))?;

        fs::create_dir_all(config_dir).context("Failed to create config directory")?;

        let contents = serde_json::to_string_pretty(&self).context("Failed to serialize config")?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&config_path)
            .context("Failed to open config file for writing")?;

        file.write_all(contents.as_bytes())
            .context("Failed to write config file")?;

        Ok(())
    }

    pub fn get_api_url(override_url: Option<String>) -> Result<String> {
        if let Some(url) = override_url {
            return Ok(url);
        }

        if let Some(url) = env_var("UFDR_API_URL") {
            return Ok(url);
        }

        match Config::load() {
            Ok(config) => Ok(config.api_url),
            Err(_) => Ok(DEFAULT_API_URL.to_string()),
        }
    }

    pub fn effective_session_id(&self) -> String {
        self.session_id
            .clone()
            .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string())
    }

    pub fn effective_part_concurrency(&self) -> usize {
        self.part_concurrency
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_PART_CONCURRENCY)
    }

    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size_bytes
            .filter(|&limit| limit > 0)
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES)
    }

    pub fn home_dir() -> Result<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            return Ok(PathBuf::from(home));
        }
        dirs::home_dir().context(
            "Could not determine home directory. Please ensure HOME environment variable is set.",
        )
    }

    fn config_path() -> Result<PathBuf> {
        let home_dir = Self::home_dir()?;
        Ok(home_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}
