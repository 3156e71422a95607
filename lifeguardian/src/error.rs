//! Error types for Life Guardian
//!
//! All errors use thiserror for structured error handling.
//! "Not found" is not an error here: lookups return `Ok(None)` instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Contact limit reached ({0} contacts per user)")]
    ContactLimitReached(usize),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_as_display_string() {
        let error = AppError::ContactLimitReached(5);

        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, "\"Contact limit reached (5 contacts per user)\"");
    }

    #[test]
    fn test_backend_error_message() {
        let error = AppError::Backend {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!("Backend returned 409: duplicate key")
        );
    }
}
