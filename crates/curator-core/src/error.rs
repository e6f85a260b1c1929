//! Error types module
//!
//! All errors in the upload pipeline are unified under the `AppError` enum,
//! which can represent database, crypto, upstream-API, and domain errors.

use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Operation canceled")]
    Canceled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON error: {}", err))
    }
}

impl AppError {
    /// HTTP status code this error maps to at the web surface.
    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::InvalidInput(_) => 400,
            AppError::Upstream { status, .. } => *status,
            _ => 500,
        }
    }

    /// Client-facing message. Internal details (SQL, crypto) are not leaked.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Crypto(_) => "Internal error".to_string(),
            AppError::InternalWithSource { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
