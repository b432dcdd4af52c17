//! Error handling for the job tracker

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobTrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Pipeline is already running")]
    PipelineAlreadyRunning,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Embedding generation error: {0}")]
    Embedding(String),

    #[error("Posting source error: {0}")]
    Source(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, JobTrackerError>;

/// Convert anyhow errors to our custom error type
impl From<anyhow::Error> for JobTrackerError {
    fn from(err: anyhow::Error) -> Self {
        JobTrackerError::Store(err.to_string())
    }
}
