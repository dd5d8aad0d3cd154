use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid distribution for variable '{variable}': {reason}")]
    InvalidDistribution { variable: String, reason: String },

    #[error("Missing model parameter: {0}")]
    MissingParameter(String),

    #[error("Model evaluation failed: {0}")]
    ModelEvaluation(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ScenarioError {
    fn from(e: serde_json::Error) -> Self {
        ScenarioError::SerializationError(e.to_string())
    }
}
