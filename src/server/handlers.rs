use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::debug;

use crate::server::api_error::ApiError;
use crate::server::extract::QueryParams;
use crate::server::registry::LicenseRegistry;
use crate::server::responses::{OkResponse, VerifyResponse};

/// Shared application state for handlers.
///
/// The registry owns the connection pool; cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    pub registry: LicenseRegistry,
}

impl AppState {
    pub fn new(registry: LicenseRegistry) -> Self {
        Self { registry }
    }
}

/// Query string of `GET /api/license/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub key: Option<String>,
    pub device: Option<String>,
}

/// Check whether a license currently grants access.
///
/// `GET /api/license/verify?key=..&device=..`
///
/// Business-rule failures (`missing_key`, `not_found`, `revoked`,
/// `bound_to_other_device`) are answered with 200 and `ok:false`; only
/// store failures produce an error status.
pub async fn verify_handler(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<VerifyQuery>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let verification = state
        .registry
        .verify(query.key.as_deref(), query.device.as_deref())
        .await?;

    Ok(Json(verification.into()))
}

/// Liveness check. Does not touch the database.
///
/// `GET /api/ping`
pub async fn ping_handler() -> Json<OkResponse> {
    debug!("Ping");
    Json(OkResponse::new())
}

/// Fallback for a known path called with the wrong verb.
pub async fn method_not_allowed_handler() -> ApiError {
    ApiError::method_not_allowed()
}

/// Fallback for unknown paths.
pub async fn not_found_handler() -> ApiError {
    ApiError::not_found()
}
