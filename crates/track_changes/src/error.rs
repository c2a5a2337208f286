//! Error types for change tracking

use crate::ChangeId;
use dom_model::DocModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Change not found: {0}")]
    ChangeNotFound(ChangeId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Change tracking is disabled")]
    TrackingDisabled,

    #[error("Invalid user: {0}")]
    InvalidUser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document model error: {0}")]
    DocModel(#[from] DocModelError),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
