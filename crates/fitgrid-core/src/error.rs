//! Error types shared by fitgrid crates.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while validating weights, loads, or configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("weights must sum to 1.0 (+/-0.01), got {sum:.4}")]
    WeightSum { sum: f64 },

    #[error("weight {name} must be non-negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },

    #[error("missing weight: {0}")]
    MissingWeight(&'static str),

    #[error("unknown weight: {0}")]
    UnknownWeight(String),

    #[error("threshold {name} must be {expected}, got {value}")]
    InvalidThreshold {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("invalid system load: {0} (expected low, normal or high)")]
    InvalidSystemLoad(String),
}
