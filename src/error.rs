//! Error types for codemend
//!
//! Centralized error handling using thiserror. Failures of generated code
//! (crashes, bad output, missing code) are data on `Attempt`, not errors;
//! only collaborator and setup failures surface here.

use thiserror::Error;

/// All error types that can occur in codemend
#[derive(Debug, Error)]
pub enum MendError {
    /// Oracle (LLM API) error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Oracle did not answer within its time budget
    #[error("LLM call timed out after {0}ms")]
    OracleTimeout(u64),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for codemend operations
pub type Result<T> = std::result::Result<T, MendError>;
