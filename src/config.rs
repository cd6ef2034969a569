//! YAML configuration
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Validation runs on load; out-of-range values are errors.

use crate::pipeline::PipelineConfig;
use crate::similarity::SimilarityConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    /// Database file; the CLI falls back to the platform data directory
    pub database: Option<PathBuf>,
    pub similarity: SimilarityConfig,
    pub pipeline: PipelineConfig,
}

impl TesseraConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.similarity.validate().map_err(ConfigError::Validation)?;
        self.pipeline.validate().map_err(ConfigError::Validation)
    }
}
