//! Application configuration management.
//!
//! Configuration is stored at `~/.config/memberdesk/config.json` and may
//! be overridden by `MEMBERDESK_*` environment variables (including those
//! loaded from a `.env` file).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use memberdesk_core::api::client::DEFAULT_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "memberdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_URL: &str = "MEMBERDESK_API_URL";
const ENV_API_TOKEN: &str = "MEMBERDESK_API_TOKEN";
const ENV_TIMEOUT_SECS: &str = "MEMBERDESK_TIMEOUT_SECS";
const ENV_LOG_DIR: &str = "MEMBERDESK_LOG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load from `path` (missing file means defaults), then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = non_empty(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(secs) = non_empty(ENV_TIMEOUT_SECS).and_then(|v| v.trim().parse().ok()) {
            self.request_timeout_secs = Some(secs);
        }
        if let Some(dir) = non_empty(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn base_url(&self) -> Result<&str> {
        self.api_base_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No API base URL configured. Set {} or add api_base_url to {}",
                ENV_API_URL,
                CONFIG_FILE
            )
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            api_base_url: Some("https://file.test".into()),
            request_timeout_secs: Some(10),
            ..Default::default()
        };
        config.apply_overrides(env(&[
            (ENV_API_URL, "https://env.test"),
            (ENV_API_TOKEN, "tok"),
            (ENV_TIMEOUT_SECS, "5"),
        ]));
        assert_eq!(config.base_url().unwrap(), "https://env.test");
        assert_eq!(config.api_token.as_deref(), Some("tok"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_blank_or_invalid_env_ignored() {
        let mut config = Config {
            api_base_url: Some("https://file.test".into()),
            request_timeout_secs: Some(10),
            ..Default::default()
        };
        config.apply_overrides(env(&[(ENV_API_URL, "  "), (ENV_TIMEOUT_SECS, "soon")]));
        assert_eq!(config.base_url().unwrap(), "https://file.test");
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_missing_base_url_is_error() {
        let config = Config::default();
        assert!(config.base_url().is_err());
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("memberdesk-config-{}.json", std::process::id()));
        let contents = r#"{"api_base_url": "https://svc.test", "request_timeout_secs": 12}"#;
        std::fs::write(&path, contents).unwrap();

        // load_from applies the process environment, so only check that it reads the file
        let loaded = Config::load_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(loaded.unwrap().api_base_url.is_some());

        let mut config: Config = serde_json::from_str(contents).unwrap();
        config.apply_overrides(env(&[]));
        assert_eq!(config.base_url().unwrap(), "https://svc.test");
        assert_eq!(config.timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("memberdesk-save-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);
        let config = Config {
            api_base_url: Some("https://svc.test".into()),
            log_dir: Some(PathBuf::from("/var/log/memberdesk")),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Config = serde_json::from_str(&contents).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_malformed_file_fails() {
        let path = std::env::temp_dir().join(format!("memberdesk-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let result = Config::load_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
