use thiserror::Error;

use super::Timestamp;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Measure {0} doesn't exist")]
    MeasureUnknown(String),

    #[error("Measure {measure} usage has been exhausted (requested {requested})")]
    MeasureExhausted { measure: String, requested: u32 },

    #[error("New period {requested} must be greater than the latest period {latest}")]
    InvalidPeriod { requested: Timestamp, latest: Timestamp },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
