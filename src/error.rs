//! Error taxonomy for journal operations.
//!
//! Storage failures are never swallowed: the engine propagates them and the
//! workflows catch them at the per-task boundary.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    NotAuthenticated,
    PersistenceFailure,
    InvalidTransition,
    InvalidFieldValue,
    ConfigError,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl JournalError {
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::Persistence(_) => ErrorCode::PersistenceFailure,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::InvalidField { .. } => ErrorCode::InvalidFieldValue,
            Self::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Structured body for API responses.
    pub fn to_body(&self) -> ErrorBody {
        let field = match self {
            Self::InvalidField { field, .. } => Some(field.clone()),
            _ => None,
        };
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            field,
        }
    }
}

impl From<rusqlite::Error> for JournalError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<refinery::Error> for JournalError {
    fn from(err: refinery::Error) -> Self {
        Self::Persistence(format!("schema migration failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for JournalError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Persistence(format!("storage worker failed: {}", err))
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("malformed stored value: {}", err))
    }
}

/// Serializable error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;
