use thiserror::Error;

/// Errors raised by the simulation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Dimension mismatch in '{field}': expected {expected}, got {actual}")]
    DimensionMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid value in '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Policy allocated to campaign {campaign}, but market has only {num_campaigns} campaigns")]
    Allocation { campaign: usize, num_campaigns: usize },

    #[error("Distribution error: {0}")]
    Distribution(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        SimError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn mismatch(field: &str, expected: usize, actual: usize) -> Self {
        SimError::DimensionMismatch {
            field: field.to_string(),
            expected,
            actual,
        }
    }
}
