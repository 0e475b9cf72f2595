use super::config::ConfigError;
use crate::core::io::statistics::StatisticsError;
use crate::core::models::IdentityError;
use crate::core::timeseries::EstimationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid box: {0}")]
    Identity(#[from] IdentityError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation engine failed during '{stage}': {message}")]
    Simulation {
        stage: &'static str,
        message: String,
    },

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize '{path}': {source}")]
    Serialization {
        path: String,
        source: serde_json::Error,
    },

    #[error("Statistics table error: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("Estimation of observable '{observable}' failed: {source}")]
    Estimation {
        observable: String,
        source: EstimationError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn serialization(path: &std::path::Path, source: serde_json::Error) -> Self {
        EngineError::Serialization {
            path: path.display().to_string(),
            source,
        }
    }
}
