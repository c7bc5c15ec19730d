//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Caller is not authorized for the operation. Raised before any write.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Email channel missing, disabled, or internally inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Outbound transport failed. Absorbed into a `failed` delivery status
    /// by the dispatcher, never returned to the reply caller.
    #[error("Transport error: {0}")]
    Transport(#[from] maildesk_transport::Error),

    /// A platform collaborator call (notification, permission check) failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
