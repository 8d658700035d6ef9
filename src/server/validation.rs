//! Request validation utilities for the registry API.
//!
//! Request bodies are loosely typed JSON; these helpers turn them into the
//! typed arguments the registry works with.

use std::fmt;

use serde_json::Value;

use crate::errors::LicenseError;

/// Longest accepted license key.
pub const MAX_KEY_LENGTH: usize = 128;
/// Longest accepted plan tag.
pub const MAX_PLAN_LENGTH: usize = 64;
/// Longest accepted device identifier.
pub const MAX_DEVICE_LENGTH: usize = 256;
/// Longest accepted note.
pub const MAX_NOTE_LENGTH: usize = 2048;

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for LicenseError {
    fn from(err: ValidationError) -> Self {
        LicenseError::InvalidInput(err.to_string())
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate that a string is at most `max` characters long.
///
/// # Example
/// ```
/// use licreg::server::validation::validate_max_length;
///
/// assert!(validate_max_length("hello", 10, "note").is_ok());
/// assert!(validate_max_length(&"a".repeat(11), 10, "note").is_err());
/// ```
pub fn validate_max_length(value: &str, max: usize, field_name: &str) -> ValidationResult<()> {
    if value.chars().count() > max {
        Err(ValidationError {
            field: field_name.to_string(),
            message: format!("must be at most {max} characters"),
        })
    } else {
        Ok(())
    }
}

/// Validate an optional string's length, if present.
pub fn validate_optional_max_length(
    value: Option<&str>,
    max: usize,
    field_name: &str,
) -> ValidationResult<()> {
    match value {
        Some(v) => validate_max_length(v, max, field_name),
        None => Ok(()),
    }
}

/// A present, non-empty string parameter.
///
/// Empty strings count as missing, as do non-string values.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A present, non-empty string in a loosely typed body field.
///
/// # Example
/// ```
/// use licreg::server::validation::str_param;
/// use serde_json::json;
///
/// assert_eq!(str_param(Some(&json!("SKU-1"))), Some("SKU-1"));
/// assert_eq!(str_param(Some(&json!(""))), None);
/// assert_eq!(str_param(Some(&json!(42))), None);
/// ```
pub fn str_param(value: Option<&Value>) -> Option<&str> {
    non_empty(value.and_then(Value::as_str))
}

/// Interpret a JSON value as a number of days.
///
/// Numbers and strings holding a number count; anything else (null,
/// booleans, arrays, objects, non-numeric strings) does not.
///
/// # Example
/// ```
/// use licreg::server::validation::coerce_days;
/// use serde_json::json;
///
/// assert_eq!(coerce_days(&json!(10)), Some(10.0));
/// assert_eq!(coerce_days(&json!("7.5")), Some(7.5));
/// assert_eq!(coerce_days(&json!("soon")), None);
/// assert_eq!(coerce_days(&json!(null)), None);
/// ```
pub fn coerce_days(value: &Value) -> Option<f64> {
    let days = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    days.is_finite().then_some(days)
}
