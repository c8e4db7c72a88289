//! Error types for the indicator engine.
//!
//! Every failure the engine can surface to its caller is a variant of
//! [`IndicatorError`]. The type is `Clone` because a single in-flight
//! computation hands its result to every caller waiting on it.

use thiserror::Error;

/// Errors that can occur while resolving or computing an indicator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    /// The mention store or sector index could not be reached or read.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// The requested indicator id is not registered in the catalog.
    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    /// A mention record was rejected (negative count, malformed row).
    #[error("Invalid record for entity '{entity_id}': {reason}")]
    InvalidRecord { entity_id: String, reason: String },

    /// A period or period range could not be parsed or is inverted.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// An indicator definition or scale in the configuration is invalid.
    #[error("Invalid indicator definition: {0}")]
    InvalidDefinition(String),

    /// The background computation task panicked or was torn down.
    #[error("Computation failed: {0}")]
    ComputationFailed(String),
}

impl IndicatorError {
    /// Create a data-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::DataUnavailable(msg.into())
    }

    /// Create an invalid-record error.
    pub fn invalid_record(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-definition error.
    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::InvalidDefinition(msg.into())
    }
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, IndicatorError>;
