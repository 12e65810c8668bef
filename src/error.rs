//! Unified error handling for the CRM core.
//!
//! Every operation returns a discriminated `CrmError` so callers can tell a
//! denial apart from a missing record or bad input. The CLI renders the
//! message; the code is what tests and callers match on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error codes for CRM operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Bad credentials at login
    AuthFailure,
    /// No usable session (anonymous, expired or corrupt token)
    Unauthenticated,
    /// Role or ownership check failed
    Forbidden,
    NotFound,
    ValidationError,
    /// Unique constraint violated (e.g. duplicate email)
    Conflict,
    PersistenceError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthFailure => "auth_failure",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::Conflict => "conflict",
            ErrorCode::PersistenceError => "persistence_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    /// Process exit code used by the binary for this failure class
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::AuthFailure | ErrorCode::Unauthenticated => 3,
            ErrorCode::Forbidden => 4,
            ErrorCode::NotFound => 5,
            ErrorCode::ValidationError | ErrorCode::Conflict => 2,
            ErrorCode::PersistenceError | ErrorCode::InternalError => 1,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level validation errors, keyed by field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error returned by every access-controlled operation
#[derive(Debug)]
pub struct CrmError {
    code: ErrorCode,
    message: String,
    fields: Option<FieldErrors>,
}

impl CrmError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&FieldErrors> {
        self.fields.as_ref()
    }

    // -------------------------------------------------------------------------
    // Convenience constructors for common error types
    // -------------------------------------------------------------------------

    /// Login failed. The message never says which check failed.
    pub fn auth_failure() -> Self {
        Self::new(ErrorCode::AuthFailure, "Invalid email or password")
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PersistenceError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Validation error with field-level details
    pub fn validation(errors: FieldErrors) -> Self {
        let message = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        Self {
            code: ErrorCode::ValidationError,
            message,
            fields: Some(errors),
        }
    }

    /// Single field validation error
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::validation(errors)
    }
}

impl std::fmt::Display for CrmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if let Some(fields) = &self.fields {
            if fields.len() > 1 {
                for (field, messages) in fields {
                    write!(f, "\n  {}: {}", field, messages.join("; "))?;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for CrmError {}

impl From<sqlx::Error> for CrmError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);

        match &err {
            sqlx::Error::RowNotFound => CrmError::not_found("Record not found"),
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("UNIQUE constraint failed") {
                    CrmError::conflict("A record with this identifier already exists")
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    CrmError::validation_field("reference", "Referenced record does not exist")
                } else {
                    CrmError::persistence("A database error occurred")
                }
            }
            _ => CrmError::persistence("A database error occurred"),
        }
    }
}

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: FieldErrors,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the error side of a field check, passing the value through
    pub fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.add(field, e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Return Ok(()) if no errors, or Err(CrmError) if there are errors
    pub fn finish(self) -> Result<(), CrmError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CrmError::validation(self.errors))
        }
    }
}
