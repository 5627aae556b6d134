use serde::{Deserialize, Serialize};
use std::fmt;

pub const INVALID_PARAMETER: &str = "INVALID_PARAMETER";
pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const FORBIDDEN: &str = "FORBIDDEN";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const STORE_QUERY_FAILED: &str = "STORE_QUERY_FAILED";
pub const STORE_WRITE_FAILED: &str = "STORE_WRITE_FAILED";
pub const STORE_LOCK_POISONED: &str = "STORE_LOCK_POISONED";
pub const DB_OPEN_FAILED: &str = "DB_OPEN_FAILED";
pub const DB_SCHEMA_FAILED: &str = "DB_SCHEMA_FAILED";
pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
pub const DAY_FORMAT_FAILED: &str = "DAY_FORMAT_FAILED";
pub const OUTPUT_FAILED: &str = "OUTPUT_FAILED";

/// Single structured error shape used by every engine layer and rendered as-is by the shell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// A request parameter that cannot be turned into a predicate, order or page window.
    ///
    /// `details` always names the field and echoes the raw value so the caller can correct it.
    pub fn invalid_parameter(field: &str, value: &str, message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMETER, message).with_details(format!("field={field}; value={value}"))
    }

    pub fn not_found(incident_id: i64) -> Self {
        Self::new(NOT_FOUND, "Incident not found").with_details(format!("id={incident_id}"))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(FORBIDDEN, message)
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
