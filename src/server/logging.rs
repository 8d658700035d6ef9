//! Request tracing and license lifecycle events.
//!
//! Each request runs inside a `request` span carrying its id, method and
//! path. Registry operations fill in the span's `license_key` field, and
//! verification also fills in `outcome`, so the completion line of every
//! request says which license it touched and what the caller was told.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/api/ping", get(ping_handler))
//!     .layer(middleware::from_fn(request_logging_middleware));
//! ```

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{error, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Header carrying the request id, both inbound and outbound.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id that is reused as-is.
const MAX_REQUEST_ID_LENGTH: usize = 64;

/// License lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEvent {
    Created,
    Extended,
    Activated,
    Revoked,
    DeviceBound,
    /// Verification answered with the license's expiry status
    Verified,
    /// Verification refused (missing key, unknown, revoked, other device)
    VerificationFailed,
}

impl LicenseEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseEvent::Created => "created",
            LicenseEvent::Extended => "extended",
            LicenseEvent::Activated => "activated",
            LicenseEvent::Revoked => "revoked",
            LicenseEvent::DeviceBound => "device_bound",
            LicenseEvent::Verified => "verified",
            LicenseEvent::VerificationFailed => "verification_failed",
        }
    }

    fn is_verification(&self) -> bool {
        matches!(self, LicenseEvent::Verified | LicenseEvent::VerificationFailed)
    }
}

impl std::fmt::Display for LicenseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit a lifecycle event and tag the enclosing request span with it.
///
/// `device` is set for bindings and device-scoped verifications; `detail`
/// carries the plan/days of a mutation or the verification outcome.
pub fn log_license_event(
    event: LicenseEvent,
    key: &str,
    device: Option<&str>,
    detail: Option<&str>,
) {
    let span = Span::current();
    if !key.is_empty() {
        span.record("license_key", key);
    }
    if event.is_verification() {
        if let Some(outcome) = detail {
            span.record("outcome", outcome);
        }
    }

    let name = event.as_str();
    if event == LicenseEvent::VerificationFailed {
        warn!(event = name, key, device, detail, "License check refused");
    } else {
        info!(event = name, key, device, detail, "License event");
    }
}

/// The caller's request id when it is short and header-safe, else a fresh one.
pub fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|id| is_acceptable_request_id(id))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn is_acceptable_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

fn log_completion(status: StatusCode, elapsed_ms: u64) {
    let status = status.as_u16();
    if status >= 500 {
        error!(status, elapsed_ms, "Request failed");
    } else if status >= 400 {
        warn!(status, elapsed_ms, "Request rejected");
    } else {
        info!(status, elapsed_ms, "Request completed");
    }
}

/// Wrap each request in a `request` span and echo its id in the response.
///
/// Server errors complete at `error`, client errors at `warn`, and
/// everything else at `info`.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = resolve_request_id(request.headers());
    let span = info_span!(
        "request",
        id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        license_key = field::Empty,
        outcome = field::Empty,
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    span.in_scope(|| log_completion(response.status(), elapsed_ms));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
