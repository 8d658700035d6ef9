//! Error responses for all registry endpoints.
//!
//! Every error body has the same shape:
//!
//! ```json
//! { "ok": false, "error": "not_found" }
//! ```
//!
//! `error` is a stable machine-readable code, except for invalid input where
//! it carries a human-readable explanation. Internal details of store
//! failures are logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::LicenseError;

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The `key` parameter is missing
    MissingKey,
    /// One of several required parameters is missing or has the wrong type
    MissingParams,
    /// A parameter is present but unusable
    InvalidInput,
    /// No license matches, or unknown path
    NotFound,
    /// Wrong HTTP verb for the path
    MethodNotAllowed,
    /// Store or other unexpected failure
    ServerError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::MissingKey | ErrorCode::MissingParams | ErrorCode::InvalidInput => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingKey => "missing_key",
            ErrorCode::MissingParams => "missing_params",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::NotFound => "not_found",
            ErrorCode::MethodNotAllowed => "method_not_allowed",
            ErrorCode::ServerError => "server_error",
        }
    }
}

/// Standardized API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Always `false`
    pub ok: bool,
    /// Error code or message
    pub error: String,
    #[serde(skip)]
    code: ErrorCode,
}

impl ApiError {
    /// Creates an error whose message is the code itself.
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.as_str())
    }

    /// Creates an error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: message.into(),
            code,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn not_found() -> Self {
        Self::new(ErrorCode::NotFound)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(ErrorCode::MethodNotAllowed)
    }

    pub fn server_error() -> Self {
        Self::new(ErrorCode::ServerError)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.error, self.status_code())
    }
}

impl std::error::Error for ApiError {}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        match err {
            LicenseError::MissingParameter("key") => ApiError::new(ErrorCode::MissingKey),
            LicenseError::MissingParameter(_) => ApiError::new(ErrorCode::MissingParams),
            LicenseError::InvalidInput(msg) => ApiError::with_message(ErrorCode::InvalidInput, msg),
            LicenseError::NotFound(_) => ApiError::not_found(),
            LicenseError::MethodNotAllowed => ApiError::method_not_allowed(),
            LicenseError::ConfigError(_) | LicenseError::ServerError(_) => {
                ApiError::server_error()
            }
        }
    }
}
