//! Configuration management

use anyhow::{Context, Result};
use fluency_insights::GeminiSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "FLUENCY_GENAI_API_KEY";

/// Generative insight service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    /// Ask the generative service before falling back to metric rules
    pub enabled: bool,

    /// API key (empty = read from `FLUENCY_GENAI_API_KEY`)
    pub api_key: String,

    /// Model name, with or without the `models/` prefix
    pub model: String,

    pub base_url: String,

    /// Upper bound on one generative call (seconds)
    pub timeout_secs: u64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            model: fluency_insights::gemini::DEFAULT_MODEL.to_string(),
            base_url: fluency_insights::gemini::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 15,
        }
    }
}

impl GenerativeConfig {
    /// Configured key, else the environment variable, else `None`
    pub fn resolve_api_key(&self) -> Option<String> {
        let configured = self.api_key.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Client settings, or `None` when disabled or no key is available
    pub fn client_settings(&self) -> Option<GeminiSettings> {
        if !self.enabled {
            return None;
        }
        let api_key = self.resolve_api_key()?;
        Some(GeminiSettings {
            api_key,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            timeout: self.timeout(),
        })
    }
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluencyConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// SQLite database (`~` is expanded)
    pub database_path: String,

    /// Previous attempts included in generative context
    pub recent_attempts_limit: usize,

    pub generative: GenerativeConfig,
}

impl Default for FluencyConfig {
    fn default() -> Self {
        let database_path = fluency_paths::default_database_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "assessments.db".to_string());

        Self {
            config_path: Self::default_config_path(),
            database_path,
            recent_attempts_limit: 5,
            generative: GenerativeConfig::default(),
        }
    }
}

impl FluencyConfig {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from `config_path`, creating it if missing
    pub fn load_from<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = fluency_paths::expand_home(config_path)?;

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;

            let mut config: FluencyConfig =
                toml::from_str(&contents).context("Failed to parse config file")?;

            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn default_config_path() -> PathBuf {
        fluency_paths::default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("fluency").join("config.toml");

        let config = FluencyConfig::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.recent_attempts_limit, 5);
        assert_eq!(config.generative.model, "gemini-1.5-flash");
        assert_eq!(config.generative.timeout(), Duration::from_secs(15));
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn test_saved_config_round_trips() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("config.toml");

        let mut config = FluencyConfig::load_from(&path).unwrap();
        config.database_path = "/tmp/other.db".to_string();
        config.generative.enabled = false;
        config.save().unwrap();

        let reloaded = FluencyConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "recent_attempts_limit = 3\n\n[generative]\nmodel = \"gemini-1.5-pro\"\n",
        )
        .unwrap();

        let config = FluencyConfig::load_from(&path).unwrap();
        assert_eq!(config.recent_attempts_limit, 3);
        assert_eq!(config.generative.model, "gemini-1.5-pro");
        assert!(config.generative.enabled);
        assert_eq!(config.generative.timeout_secs, 15);
    }

    #[test]
    fn test_disabled_generative_has_no_client_settings() {
        let config = GenerativeConfig {
            enabled: false,
            api_key: "key".to_string(),
            ..GenerativeConfig::default()
        };
        assert!(config.client_settings().is_none());

        let enabled = GenerativeConfig {
            api_key: " key ".to_string(),
            ..GenerativeConfig::default()
        };
        assert_eq!(enabled.client_settings().unwrap().api_key, "key");
    }
}
