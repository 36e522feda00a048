use thiserror::Error;

use crate::sensor::measurement::SensorType;

/// Failures raised while processing a measurement. None of them leave the
/// filter in a partially updated state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Cholesky needs a strictly positive definite matrix, so a singular but
    /// semi-definite covariance ends up here as well.
    #[error("augmented covariance is not strictly positive definite, cannot generate sigma points")]
    CovarianceNotPositiveDefinite,

    #[error("{sensor:?} innovation covariance is singular")]
    SingularInnovationCovariance { sensor: SensorType },

    #[error("measurement timestamp {current} is older than previous timestamp {previous}")]
    NonMonotonicTimestamp { previous: u64, current: u64 },

    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("no estimations to evaluate")]
    Empty,

    #[error("{estimations} estimations but {ground_truths} ground truth values")]
    LengthMismatch {
        estimations: usize,
        ground_truths: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("noise standard deviation `{name}` must be finite and positive, got {value}")]
    InvalidNoise { name: &'static str, value: f64 },
}

/// Problems with the tab-separated measurement input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read input: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: unknown sensor type `{tag}`")]
    UnknownSensor { line: u64, tag: String },

    #[error("line {line}: missing field `{field}`")]
    MissingField { line: u64, field: &'static str },

    #[error("line {line}: cannot parse `{value}` as {field}")]
    InvalidNumber {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: {source}")]
    Measurement { line: u64, source: FilterError },
}
