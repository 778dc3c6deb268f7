//! Error types for the diabetes risk client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiabRiskError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Not found: {0}")]
    NotFound(String),

    /// History slot could not be parsed. Recovered to an empty history, never shown.
    #[error("Stored history is corrupt: {0}")]
    StorageCorrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("GUI error: {0}")]
    Gui(String),
}

/// Failure of a single call to the prediction endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    /// Transport failure, timeout, or non-success HTTP status
    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl DiabRiskError {
    /// Message suitable for showing to the user in place of the failed action
    pub fn user_message(&self) -> String {
        match self {
            DiabRiskError::InvalidInput(msg) => msg.clone(),
            DiabRiskError::Prediction(_) => {
                "An error occurred while predicting. Please try again.".to_string()
            }
            DiabRiskError::NotFound(what) => format!("{} was not found.", what),
            other => other.to_string(),
        }
    }
}
