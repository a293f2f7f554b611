use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Generation or training parameters are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Encoding was attempted against an incompatible category set
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A class is too small to appear in both partitions of a stratified split
    #[error("Insufficient samples for class {class}: found {count}, need {required}")]
    InsufficientClassSamples {
        class: String,
        count: usize,
        required: usize,
    },

    /// Inference input references a column outside the training schema
    #[error("Unknown feature column: {0}")]
    UnknownFeatureColumn(String),

    /// Configuration sources could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The underlying classifier reported a failure
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            AppError::InsufficientClassSamples { .. } => "INSUFFICIENT_CLASS_SAMPLES",
            AppError::UnknownFeatureColumn(_) => "UNKNOWN_FEATURE_COLUMN",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Classifier(_) => "CLASSIFIER_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidConfiguration(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
