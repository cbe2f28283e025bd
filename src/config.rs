use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub negotiation: NegotiationConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ProviderConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub video_model: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct NegotiationConfig {
    /// Maximum cumulative discount off the list price (0.25 = floor at 75%).
    pub max_total_discount: f64,
    /// Maximum drop of the seller's offered price in a single turn.
    pub max_step_discount: f64,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct GenerationConfig {
    /// Fixed wait between status checks on a long-running operation.
    pub poll_interval_seconds: u64,
    /// Overall cap on a single generation. `None` waits until the provider
    /// reports done, matching the original behavior.
    pub max_wait_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            chat_model: "gemini-3-flash-preview".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            timeout_seconds: Some(60),
        }
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_total_discount: 0.25,
            max_step_discount: 0.15,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            max_wait_seconds: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Some("json".to_string()),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            crate::error::EngineError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: AppConfig = toml::from_str(&config_str).map_err(|e| {
            crate::error::EngineError::Config(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    pub fn load_with_env_overrides<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;

        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            config.provider.api_key = Some(api_key);
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            config.logging.level = log_level;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.api_base.is_empty() {
            return Err(crate::error::EngineError::Config(
                "Provider API base cannot be empty".to_string(),
            ));
        }

        if self.provider.chat_model.is_empty() {
            return Err(crate::error::EngineError::Config(
                "Chat model cannot be empty".to_string(),
            ));
        }

        let total = self.negotiation.max_total_discount;
        if !(0.0..1.0).contains(&total) {
            return Err(crate::error::EngineError::Config(
                "max_total_discount must be within [0, 1)".to_string(),
            ));
        }

        let step = self.negotiation.max_step_discount;
        if !(0.0..1.0).contains(&step) {
            return Err(crate::error::EngineError::Config(
                "max_step_discount must be within [0, 1)".to_string(),
            ));
        }

        if self.generation.poll_interval_seconds == 0 {
            return Err(crate::error::EngineError::Config(
                "poll_interval_seconds cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn get_api_key(&self) -> Option<&str> {
        self.provider.api_key.as_deref()
    }
}

pub fn create_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let default_config = AppConfig::default();
    let toml_str = toml::to_string_pretty(&default_config).map_err(|e| {
        crate::error::EngineError::Config(format!("Failed to serialize default config: {}", e))
    })?;

    std::fs::write(path, toml_str).map_err(|e| {
        crate::error::EngineError::Config(format!("Failed to write default config file: {}", e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.generation.poll_interval_seconds, 10);
        assert_eq!(config.generation.max_wait_seconds, None);
        assert_eq!(config.negotiation.max_total_discount, 0.25);
        assert_eq!(config.provider.chat_model, "gemini-3-flash-preview");
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.generation.poll_interval_seconds = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.negotiation.max_total_discount = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        create_default_config_file(path).unwrap();
        assert!(path.exists());

        let loaded_config = AppConfig::load(path).unwrap();
        assert_eq!(loaded_config.generation.poll_interval_seconds, 10);
    }

    #[test]
    fn test_partial_config_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let test_config = r#"
[provider]
api_base = "https://generativelanguage.googleapis.com/v1beta"
chat_model = "gemini-3-flash-preview"
image_model = "gemini-3-pro-image-preview"
video_model = "veo-3.1-fast-generate-preview"

[negotiation]
max_total_discount = 0.2
max_step_discount = 0.1

[generation]
poll_interval_seconds = 5
max_wait_seconds = 600

[logging]
level = "debug"
"#;
        std::fs::write(temp_file.path(), test_config).unwrap();

        let config = AppConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.negotiation.max_total_discount, 0.2);
        assert_eq!(config.generation.max_wait_seconds, Some(600));
        assert!(config.validate().is_ok());
    }
}
