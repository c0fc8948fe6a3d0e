use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GmailError, Result};
use crate::record::BodySelection;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Gmail search query used when no range or query is given; empty means all mail
    #[serde(default)]
    pub default_query: String,
    #[serde(default = "default_range_days")]
    pub range_days: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            default_query: String::new(),
            range_days: default_range_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default)]
    pub body_selection: BodySelection,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            body_selection: BodySelection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u16,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_content_chars: default_max_content_chars(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_max_results() -> u32 {
    50
}

fn default_range_days() -> u32 {
    7
}

fn default_preview_chars() -> usize {
    500
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u16 {
    500
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_content_chars() -> usize {
    3000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_results == 0 {
            return Err(GmailError::ConfigError(
                "fetch.max_results must be at least 1".to_string(),
            ));
        }
        // users.messages.list caps maxResults at 500
        if self.fetch.max_results > 500 {
            return Err(GmailError::ConfigError(
                "fetch.max_results cannot exceed 500".to_string(),
            ));
        }

        if self.fetch.range_days == 0 {
            return Err(GmailError::ConfigError(
                "fetch.range_days must be at least 1".to_string(),
            ));
        }
        if self.fetch.range_days > 365 {
            return Err(GmailError::ConfigError(
                "fetch.range_days cannot exceed 365 (1 year)".to_string(),
            ));
        }

        if self.content.preview_chars == 0 {
            return Err(GmailError::ConfigError(
                "content.preview_chars must be greater than 0".to_string(),
            ));
        }

        if self.annotation.model.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "annotation.model cannot be empty".to_string(),
            ));
        }
        if self.annotation.max_tokens == 0 {
            return Err(GmailError::ConfigError(
                "annotation.max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.annotation.temperature) {
            return Err(GmailError::ConfigError(format!(
                "annotation.temperature must be between 0.0 and 2.0, got {}",
                self.annotation.temperature
            )));
        }
        if self.annotation.max_content_chars == 0 {
            return Err(GmailError::ConfigError(
                "annotation.max_content_chars must be greater than 0".to_string(),
            ));
        }
        if self.annotation.timeout_secs == 0 {
            return Err(GmailError::ConfigError(
                "annotation.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.annotation.api_key_env.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "annotation.api_key_env cannot be empty".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
