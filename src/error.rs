//! Error types for the scanner service.

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Mailbox and credential errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    /// The grant is gone — terminal until the user reconnects the integration.
    #[error("Authorization failed for account {account_id}: {reason}")]
    Auth { account_id: Uuid, reason: String },

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Mailbox search failed: {0}")]
    Search(String),

    #[error("Fetch failed for message {message_id}: {reason}")]
    Fetch { message_id: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fallback extractor errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scan-pass errors. Anything here aborts the pass for one account only;
/// the watermark is left untouched so the same messages are retried next tick.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Produced after the integration has been disabled for the account.
    #[error("Authorization revoked for account {account_id}; integration disabled")]
    AuthRevoked { account_id: Uuid },

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
