//! Core error types for formforge.
//!
//! This module provides the [`ForgeError`] enum covering database errors,
//! element-ordering errors, validation errors, and configuration errors,
//! plus the structured [`ValidationError`] type used for aggregated
//! field-level failures.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing per-field error lists). Compound errors are how the element
/// write paths and the response-capture engine report every problem in one
/// round trip instead of stopping at the first.
///
/// # Examples
///
/// ```
/// use formforge_core::error::ValidationError;
///
/// // Simple validation error
/// let err = ValidationError::new("This field is required.", "required");
///
/// // Field-level validation errors
/// let mut field_errors = std::collections::HashMap::new();
/// field_errors.insert(
///     "choices".to_string(),
///     vec![ValidationError::new("Choice fields require choices.", "required")],
/// );
/// let err = ValidationError::with_field_errors(field_errors);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of failure (e.g. "required", "invalid").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-field validation errors, keyed by field name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the error carries any per-field errors.
    pub fn has_field_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }

    /// Returns the messages recorded for a field, empty if the field is clean.
    pub fn field_messages(&self, field: &str) -> Vec<&str> {
        self.field_errors
            .get(field)
            .map(|errors| errors.iter().map(|e| e.message.as_str()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut first = true;
            for (field, errors) in &self.field_errors {
                for error in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for formforge.
///
/// Covers database/ORM-style errors, the element-ordering error taxonomy
/// (unknown element types, sequence-number collisions, repeat submissions),
/// validation errors, and configuration errors.
///
/// Each variant maps to an appropriate HTTP status code via
/// [`ForgeError::status_code`] for the benefit of whatever HTTP layer hosts
/// this core.
#[derive(Error, Debug)]
pub enum ForgeError {
    // ── ORM / database errors ────────────────────────────────────────

    /// A lookup for a single object matched nothing.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A lookup for a single object matched more than one row.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A general database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A database constraint violation.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// A database connection or operational error.
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Element ordering errors ──────────────────────────────────────

    /// A type discriminator does not resolve to a registered orderable
    /// element variant.
    #[error("Unknown element type: {0}")]
    UnknownElementType(String),

    /// A sequence number collides with a different element in the same form.
    /// The caller may retry with a recomputed number or omit the explicit
    /// number to have one allocated.
    #[error("Sequence number {seq_no} is already taken on form {form_id}")]
    DuplicateSequenceNumber {
        /// The form whose ordering was being changed.
        form_id: i64,
        /// The contested sequence number.
        seq_no: i64,
    },

    /// The respondent already has a completion record for this form.
    /// A conflict signal for the view layer, not a hard failure.
    #[error("User {user_id} has already completed form {form_id}")]
    AlreadyCompleted {
        /// The form being submitted to.
        form_id: i64,
        /// The respondent's user id.
        user_id: i64,
    },

    // ── Validation ───────────────────────────────────────────────────

    /// A validation failure, possibly aggregating field-level errors.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Authorization ────────────────────────────────────────────────

    /// The user is not allowed to perform the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ── Configuration ────────────────────────────────────────────────

    /// Settings could not be loaded or are invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// Data could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ForgeError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `ValidationError`, `UnknownElementType` -> 400
    /// - `PermissionDenied` -> 403
    /// - `DoesNotExist` -> 404
    /// - `DuplicateSequenceNumber`, `AlreadyCompleted` -> 409
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError(_) | Self::UnknownElementType(_) => 400,
            Self::PermissionDenied(_) => 403,
            Self::DoesNotExist(_) => 404,
            Self::DuplicateSequenceNumber { .. } | Self::AlreadyCompleted { .. } => 409,
            Self::MultipleObjectsReturned(_)
            | Self::DatabaseError(_)
            | Self::IntegrityError(_)
            | Self::OperationalError(_)
            | Self::ConfigurationError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Builds a `ValidationError` variant carrying a single field error.
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(
            field.into(),
            vec![ValidationError::new(message, "invalid")],
        );
        Self::ValidationError(ValidationError::with_field_errors(field_errors))
    }
}

/// A convenience type alias for `Result<T, ForgeError>`.
pub type ForgeResult<T> = Result<T, ForgeError>;
