//! Error handling
//!
//! One error type for the store, services, storage and generation code.
//! The client cache does not use it directly; remote failures reach the cache
//! as an [`ApiResult`](crate::client::api::ApiResult).

use rusqlite::{ffi, ErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// No session, or the session is not valid.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Authenticated, but the session may not touch this row.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An illegal field value.
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// A uniqueness or referential constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object storage call failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generation provider call failed.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable code used on the wire, e.g. in a `ResponseStatus`.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Unauthenticated",
            Self::Forbidden(_) => "Forbidden",
            Self::Validation { .. } => "ValidationError",
            Self::Conflict(_) => "Conflict",
            Self::NotFound(_) => "NotFound",
            Self::Database(_) | Self::Sqlite(_) => "DatabaseError",
            Self::Io(_) => "IOException",
            Self::Serialization(_) => "SerializationException",
            Self::Storage(_) => "StorageError",
            Self::Provider(_) => "ProviderError",
            Self::Config(_) => "ConfigurationError",
        }
    }

    /// The offending field, for validation failures.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Key clashes are conflicts, other constraint failures are bad input, everything
/// else is infrastructure.
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(inner, msg) = &err {
            if inner.code == ErrorCode::ConstraintViolation {
                let detail = msg
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string());
                return match inner.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE
                    | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    | ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::Conflict(detail),
                    _ => Self::validation("record", detail),
                };
            }
        }
        Self::Sqlite(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::validation("handle", "Invalid chars in Handle");
        assert_eq!(
            err.to_string(),
            "Validation error on handle: Invalid chars in Handle"
        );
        assert_eq!(err.field_name(), Some("handle"));
        assert_eq!(err.error_code(), "ValidationError");
    }

    #[test]
    fn test_constraint_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: AppError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_foreign_key_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (parent_id INTEGER NOT NULL REFERENCES parent(id));",
        )
        .unwrap();
        let err: AppError = conn
            .execute("INSERT INTO child VALUES (7)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_not_null_and_check_violations_are_validation_errors() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT NOT NULL, n INTEGER CHECK (n > 0));")
            .unwrap();

        let err: AppError = conn
            .execute("INSERT INTO t (v, n) VALUES (NULL, 1)", [])
            .unwrap_err()
            .into();
        assert_eq!(err.field_name(), Some("record"));
        assert_eq!(err.error_code(), "ValidationError");

        let err: AppError = conn
            .execute("INSERT INTO t (v, n) VALUES ('a', 0)", [])
            .unwrap_err()
            .into();
        assert!(!matches!(err, AppError::Conflict(_)));
        assert_eq!(err.field_name(), Some("record"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }
}
