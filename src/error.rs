use serde::Serialize;
use thiserror::Error;

/// Result type for the estimators
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors raised while validating inputs or fitting the tail model.
///
/// Configuration, empty-series and shape errors are fatal. The tail variants
/// are also used as structured warnings on [`crate::tail::TailRiskReport`].
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum RiskError {
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("return series is empty")]
    EmptySeries,

    #[error("length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("tail sample of {size} losses is below the minimum of {minimum} for a GPD fit")]
    InsufficientTailSample { size: usize, minimum: usize },

    #[error("degenerate GPD fit (shape {shape:.4}): {reason}")]
    DegenerateFit { shape: f64, reason: &'static str },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl RiskError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for RiskError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RiskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
