use thiserror::Error;

use crate::models::EntityRef;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("invalid order signal for {entity}: {reason}")]
    InvalidSignal { entity: EntityRef, reason: String },
    #[error("{operation} requires at least one entity")]
    EmptyBatch { operation: &'static str },
    #[error("order data unavailable for {entity}: {reason}")]
    DataUnavailable { entity: EntityRef, reason: String },
}

impl ScoringError {
    pub fn invalid(entity: &EntityRef, reason: impl Into<String>) -> Self {
        Self::InvalidSignal {
            entity: entity.clone(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(entity: &EntityRef, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            entity: entity.clone(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),
    #[error("score weights must be non-negative and sum to 1.0 (got {0:.4})")]
    InvalidWeights(f64),
    #[error("level thresholds must satisfy 100 >= active > medium > low > 0")]
    InvalidThresholds,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("telemetry error: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}
