//! Error types for scenekeeper

use thiserror::Error;

use crate::resource::ResourceId;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource {0} is already registered")]
    DuplicateResource(ResourceId),

    #[error("Resource id {0} is below the next free id and cannot be reused")]
    RetiredResource(ResourceId),

    #[error("Resource id {0} leaves no room for further ids")]
    IdOutOfRange(ResourceId),

    #[error("Malformed resource: {0}")]
    MalformedResource(String),

    #[error("Simplification error: {0}")]
    Simplification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
