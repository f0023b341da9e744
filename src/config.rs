use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::prompts::Messages;

const BASE_URL_ENV: &str = "CHATTR_BASE_URL";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the agent server, e.g. `http://localhost:5005`
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries after the first failed send
    pub max_retries: u32,

    /// Pause before each retry, in milliseconds
    pub retry_delay_ms: u64,

    /// Delay between consecutive reply segments, in milliseconds
    pub stagger_ms: u64,

    /// How long a pressed quick reply stays highlighted, in milliseconds
    pub highlight_ms: u64,

    /// Seconds between connection probes
    pub health_interval_secs: u64,

    /// chrono format string for message timestamps
    pub time_format: String,

    /// Where history and logs live
    pub data_dir: PathBuf,

    /// User-facing strings
    pub messages: Messages,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        Config {
            base_url: "http://localhost:5005".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            stagger_ms: 500,
            highlight_ms: 1000,
            health_interval_secs: 30,
            time_format: "%I:%M %p".to_string(),
            data_dir: home.join(".chattr"),
            messages: Messages::default(),
        }
    }
}

impl Config {
    /// `~/.chattr/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".chattr").join("config.toml"))
    }

    /// Read `config_path`, falling back to defaults when it is absent, then
    /// apply the environment override.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

        Ok(config)
    }

    /// Write the current configuration next to the history file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("chattr.log")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn highlight(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut defaults = Config::default();
        defaults.data_dir = dir.path().join("data");
        let path = dir.path().join("config.toml");
        defaults.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.max_retries, 3);
        assert_eq!(loaded.stagger(), Duration::from_millis(500));
        assert!(loaded.data_dir.exists());
    }

    #[test]
    fn partial_file_overrides_selected_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");
        fs::write(
            &path,
            format!(
                "base_url = \"http://bot.local:5005/\"\nmax_retries = 5\ndata_dir = {:?}\n\n[messages]\nfallback = \"huh?\"\n",
                data_dir
            ),
        )
        .unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.max_retries, 5);
        assert_eq!(loaded.retry_delay_ms, 1000);
        assert_eq!(loaded.messages.fallback, "huh?");
        assert_eq!(loaded.history_path(), data_dir.join("history.json"));
        if std::env::var(BASE_URL_ENV).is_err() {
            assert_eq!(loaded.base_url, "http://bot.local:5005");
        }
    }
}
