use crate::error::Result;
use crate::ml::features::EncoderConfig;
use crate::ml::service::TrainingConfig;
use crate::synthetic::{CorrelationConfig, CorrelationInjector, GenerationConfig, RecordGenerator};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "TRAFFIC_SEVERITY_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/traffic-severity.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Synthetic record generation
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Ordered severity resampling rules
    #[serde(default)]
    pub correlation: CorrelationConfig,

    /// Categorical encoding
    #[serde(default)]
    pub encoding: EncoderConfig,

    /// Split and ensemble options
    #[serde(default)]
    pub training: TrainingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Layer embedded defaults, an optional file and `TRAFFIC_SEVERITY__*` variables
    pub fn load_from(path: &Path) -> std::result::Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix: TRAFFIC_SEVERITY__)
            .add_source(
                config::Environment::with_prefix("TRAFFIC_SEVERITY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Check scalar ranges, distributions and rules before any data is produced
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.training.validate()?;
        RecordGenerator::new(&self.generation)?;
        CorrelationInjector::new(&self.correlation)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "traffic_severity=info".to_string()
}
