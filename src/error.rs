//! Error types for the financial advisor agent

use thiserror::Error;

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Quote source error: {0}")]
    QuoteSourceError(String),

    #[error("Search backend error: {0}")]
    SearchError(String),

    #[error("History store error: {0}")]
    HistoryError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),
}
