// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{FilingError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub courts: Vec<CourtConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Workspace API key. The filing provider enforces a hard limit of 30
    /// requests per minute and blocks keys caught polling.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub uploads_dir: String,
    pub archive_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub max_file_size_mb: usize,
    /// Seconds to keep the progress channel open after completion so slow
    /// subscribers can drain.
    pub close_grace_secs: u64,
    pub event_channel_capacity: usize,
}

/// One court the workspace is allowed to file with, keyed by the justice
/// branch + court blocks of the CNJ (e.g. "8.09").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CourtConfig {
    pub code: String,
    pub name: String,
    /// Default petition piece type (fk_peca) used when protocoling.
    pub default_piece_type: Option<i64>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PETITION_FILER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| FilingError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| FilingError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            api: ApiConfig {
                base_url: "https://app.legalmail.com.br".to_string(),
                api_key: None,
            },
            storage: StorageConfig {
                uploads_dir: "./uploads".to_string(),
                archive_prefix: "arquivos-eternos".to_string(),
            },
            pipeline: PipelineConfig {
                max_file_size_mb: 50,
                close_grace_secs: 5,
                event_channel_capacity: 256,
            },
            courts: vec![CourtConfig {
                code: "8.09".to_string(),
                name: "TJGO".to_string(),
                default_piece_type: Some(1),
            }],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(FilingError::Config("api.base_url must be set".to_string()));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(FilingError::Config(format!(
                "api.base_url must be an http(s) URL: {}",
                self.api.base_url
            )));
        }
        if self.pipeline.max_file_size_mb == 0 {
            return Err(FilingError::Config(
                "pipeline.max_file_size_mb must be greater than 0".to_string(),
            ));
        }
        if self.pipeline.event_channel_capacity == 0 {
            return Err(FilingError::Config(
                "pipeline.event_channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.courts.len(), 1);
        assert_eq!(config.courts[0].code, "8.09");
    }

    #[test]
    fn test_validation_rejects_bad_base_url() {
        let mut config = Config::default_config();
        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let mut config = Config::default_config();
        config.pipeline.event_channel_capacity = 0;
        assert!(config.validate().is_err());
    }
}
