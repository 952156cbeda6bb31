//! Core error types for breathroom-core.
//!
//! Validation and usage errors are surfaced synchronously to the caller and
//! are never retried. The periodic tick itself has no error path.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for breathroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A candidate pattern failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] PatternValidationError),

    /// A control entry point was called in a state that cannot serve it.
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// Catalog-level failures (unknown id, builtin mutation, limits).
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One violated rule on one field of a candidate pattern.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldViolation {
    /// Field name as exposed to clients (`inhale`, `holdAfterExhale`, ...).
    pub field: String,
    /// Human-readable rule, e.g. `must be > 0`.
    pub rule: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.rule)
    }
}

/// Every violation found on a candidate pattern, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternValidationError {
    pub violations: Vec<FieldViolation>,
}

impl PatternValidationError {
    /// True if any violation targets `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Names of all offending fields, deduplicated, in first-seen order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for v in &self.violations {
            if !out.contains(&v.field.as_str()) {
                out.push(v.field.as_str());
            }
        }
        out
    }
}

impl fmt::Display for PatternValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for PatternValidationError {}

/// Errors raised by control entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("no pattern selected")]
    NoPatternSelected,

    /// The session task has shut down and can no longer accept commands.
    #[error("session controller is closed")]
    ControllerClosed,
}

/// Pattern catalog errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Pattern not found: {0}")]
    NotFound(String),

    #[error("Built-in pattern '{0}' cannot be modified or deleted")]
    BuiltinImmutable(String),

    #[error("Custom pattern limit reached ({limit}) for owner '{owner}'")]
    LimitReached { owner: String, limit: usize },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt row in '{table}': {message}")]
    CorruptRow { table: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = PatternValidationError {
            violations: vec![
                FieldViolation::new("inhale", "must be > 0"),
                FieldViolation::new("exhale", "must be > 0"),
            ],
        };
        assert_eq!(err.to_string(), "inhale must be > 0; exhale must be > 0");
        assert_eq!(err.fields(), vec!["inhale", "exhale"]);
        assert!(!err.has_field("hold"));
    }

    #[test]
    fn usage_error_message() {
        let err: CoreError = UsageError::NoPatternSelected.into();
        assert_eq!(err.to_string(), "Usage error: no pattern selected");
    }
}
