use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeliconError {
    /// Source or target key could not be resolved. Surfaced to the caller.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A graph store was asked about a node it does not hold.
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("No path from {from} to {to} within {max_hops} hops")]
    NoPath { from: String, to: String, max_hops: usize },

    #[error("Graph store call timed out: {0}")]
    StoreTimeout(String),

    #[error("Malformed weights file {path}: {reason}")]
    MalformedWeightsFile { path: String, reason: String },

    #[error("No training examples for task {0}")]
    InsufficientTrainingData(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HeliconError {
    /// Transient failures that callers degrade to "no evidence".
    pub fn is_transient(&self) -> bool {
        matches!(self, HeliconError::StoreTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, HeliconError>;
