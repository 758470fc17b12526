//! Errors raised by the world model.

use thiserror::Error;

use crate::entities::{NodeLabel, SceneId};

/// Result alias for world model operations.
pub type WorldResult<T> = Result<T, WorldError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorldError {
    #[error("invalid compass direction: {0:?}")]
    InvalidDirection(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding contains non-finite values")]
    NonFiniteEmbedding,

    #[error("scene not found: {0}")]
    UnknownScene(SceneId),

    #[error("label {0} does not carry embeddings")]
    UnsupportedLabel(NodeLabel),

    #[error("no vector index declared for label {0}")]
    MissingVectorIndex(NodeLabel),

    #[error("unknown node label: {0:?}")]
    UnknownLabel(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<serde_json::Error> for WorldError {
    fn from(err: serde_json::Error) -> Self {
        WorldError::Snapshot(err.to_string())
    }
}
