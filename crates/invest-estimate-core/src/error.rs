use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid fee table '{table}': {reason}")]
    InvalidFeeTable { table: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EstimateError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        EstimateError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EstimateError {
    fn from(e: serde_json::Error) -> Self {
        EstimateError::SerializationError(e.to_string())
    }
}
