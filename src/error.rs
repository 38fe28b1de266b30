//! Error types for the music store agent

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Graph & Session Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Step limit exceeded: {0}")]
    StepLimitExceeded(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session {0} is waiting for an account confirmation")]
    ConfirmationPending(Uuid),

    #[error("Session {0} has no account confirmation pending")]
    NoPendingConfirmation(Uuid),

    // =============================
    // Store & Startup Errors
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Data source error: {0}")]
    DataSourceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
