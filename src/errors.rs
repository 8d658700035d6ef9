//! Error taxonomy for the license registry.
//!
//! Every fallible operation in the crate returns [`LicenseResult`]. The HTTP
//! layer turns these into `{ok:false, error}` envelopes in
//! `server::api_error`.

use thiserror::Error;

/// Errors produced by the registry and its supporting modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseError {
    /// A required request parameter was absent or empty.
    ///
    /// The payload names the parameter group (`key`, `params`) and is
    /// rendered on the wire as `missing_<name>`.
    #[error("missing_{0}")]
    MissingParameter(&'static str),

    /// A parameter was present but unusable (wrong type, out of range,
    /// duplicate key, malformed body).
    #[error("{0}")]
    InvalidInput(String),

    /// No license matches the given key.
    #[error("license not found: {0}")]
    NotFound(String),

    /// The HTTP verb is not supported on this path.
    #[error("method_not_allowed")]
    MethodNotAllowed,

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Store or other unexpected failure.
    #[error("server error: {0}")]
    ServerError(String),
}

/// Convenience alias used throughout the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;
