use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "news-aggregator";
const BOT_TOKEN_ENV: &str = "NEWS_BOT_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub telegram_bot_token: Option<String>,

    #[serde(default = "default_telegram_api_base_url")]
    pub telegram_api_base_url: String,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u64,

    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    #[serde(default = "default_listing_timeout")]
    pub listing_timeout_secs: u64,

    #[serde(default = "default_article_timeout")]
    pub article_timeout_secs: u64,

    #[serde(default = "default_extract_delay")]
    pub extract_delay_ms: u64,

    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

fn default_telegram_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_max_concurrent_sources() -> usize {
    8
}

fn default_listing_timeout() -> u64 {
    15
}

fn default_article_timeout() -> u64 {
    10
}

fn default_extract_delay() -> u64 {
    1000
}

fn default_max_requests_per_minute() -> u32 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            telegram_bot_token: None,
            telegram_api_base_url: default_telegram_api_base_url(),
            sweep_interval_minutes: default_sweep_interval(),
            max_concurrent_sources: default_max_concurrent_sources(),
            listing_timeout_secs: default_listing_timeout(),
            article_timeout_secs: default_article_timeout(),
            extract_delay_ms: default_extract_delay(),
            max_requests_per_minute: default_max_requests_per_minute(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `path` (or the default location), writing defaults when the
    /// file does not exist yet. `NEWS_BOT_TOKEN` wins over the file's token.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        if let Ok(token) = std::env::var(BOT_TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.telegram_bot_token = Some(token.trim().to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.sweep_interval_minutes == 0 {
            return Err(AppError::Config(
                "sweep_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_sources == 0 {
            return Err(AppError::Config(
                "max_concurrent_sources must be at least 1".to_string(),
            ));
        }
        if self.max_requests_per_minute == 0 {
            return Err(AppError::Config(
                "max_requests_per_minute must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes * 60)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn article_timeout(&self) -> Duration {
        Duration::from_secs(self.article_timeout_secs)
    }

    pub fn extract_delay(&self) -> Duration {
        Duration::from_millis(self.extract_delay_ms)
    }
}
