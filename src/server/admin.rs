//! Admin API handlers for license management.
//!
//! These endpoints are unauthenticated; deploy them behind a trusted network
//! boundary.
//!
//! # Endpoints
//!
//! - `POST /api/admin/create` - Issue a new license
//! - `POST /api/admin/extend` - Push a license's expiry out
//! - `POST /api/admin/set-active` - Revoke or reactivate a license
//! - `POST /api/admin/bind-device` - Bind a license to a device
//! - `GET /api/admin/info?key=..` - Fetch the full license record

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{LicenseError, LicenseResult};
use crate::plans::DEFAULT_EXTEND_DAYS;
use crate::server::api_error::ApiError;
use crate::server::extract::{JsonBody, QueryParams};
use crate::server::handlers::AppState;
use crate::server::registry::CreateLicense;
use crate::server::responses::{CreateResponse, ExtendResponse, InfoResponse, OkResponse};
use crate::server::validation::{coerce_days, str_param};

// ============================================================================
// Request Types
// ============================================================================

/// Request body for creating a license.
#[derive(Debug, Default, Deserialize)]
pub struct CreateLicenseRequest {
    /// Plan tag (default `month`)
    pub plan: Option<String>,
    /// Lifetime in days; a number or a numeric string
    pub days: Option<Value>,
    /// Caller-chosen key (generated when absent)
    pub key: Option<String>,
    pub note: Option<String>,
    /// Device to bind immediately
    pub device: Option<String>,
}

/// Request body for extending a license.
#[derive(Debug, Default, Deserialize)]
pub struct ExtendLicenseRequest {
    pub key: Option<Value>,
    /// Days to add (default 30); a number or a numeric string
    pub days: Option<Value>,
}

/// Request body for revoking or reactivating a license.
#[derive(Debug, Default, Deserialize)]
pub struct SetActiveRequest {
    pub key: Option<Value>,
    /// Must be a JSON boolean
    #[serde(rename = "isActive")]
    pub is_active: Option<Value>,
}

/// Request body for binding a device.
#[derive(Debug, Default, Deserialize)]
pub struct BindDeviceRequest {
    pub key: Option<Value>,
    pub device: Option<Value>,
}

/// Query string of `GET /api/admin/info`.
#[derive(Debug, Default, Deserialize)]
pub struct InfoQuery {
    pub key: Option<String>,
}

/// Days to add on extend. Absent or null means the default; anything else
/// must be numeric.
fn extend_days(days: Option<&Value>) -> LicenseResult<f64> {
    match days {
        None | Some(Value::Null) => Ok(DEFAULT_EXTEND_DAYS),
        Some(value) => coerce_days(value)
            .ok_or_else(|| LicenseError::InvalidInput("days must be a number".to_string())),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a new license.
///
/// `POST /api/admin/create`
///
/// Non-numeric `days` fall back to the plan's default lifetime. A supplied
/// key that already exists is rejected with 400.
pub async fn create_license_handler(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateLicenseRequest>,
) -> Result<Json<CreateResponse>, ApiError> {
    let request = CreateLicense {
        plan: payload.plan,
        days: payload.days.as_ref().and_then(coerce_days),
        key: payload.key,
        note: payload.note,
        device: payload.device,
    };

    let license = state.registry.create(request).await?;

    Ok(Json(license.into()))
}

/// Extend a license from the later of now and its current expiry.
///
/// `POST /api/admin/extend`
pub async fn extend_license_handler(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ExtendLicenseRequest>,
) -> Result<Json<ExtendResponse>, ApiError> {
    let key = str_param(payload.key.as_ref()).ok_or(LicenseError::MissingParameter("key"))?;
    let days = extend_days(payload.days.as_ref())?;

    let expires_at = state.registry.extend(key, days).await?;

    Ok(Json(ExtendResponse {
        ok: true,
        key: key.to_string(),
        expires_at,
    }))
}

/// Revoke (`isActive: false`) or reactivate (`isActive: true`) a license.
///
/// `POST /api/admin/set-active`
pub async fn set_active_handler(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SetActiveRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let key = str_param(payload.key.as_ref());
    let is_active = payload.is_active.as_ref().and_then(Value::as_bool);

    let (Some(key), Some(is_active)) = (key, is_active) else {
        return Err(LicenseError::MissingParameter("params").into());
    };

    state.registry.set_active(key, is_active).await?;

    Ok(Json(OkResponse::new()))
}

/// Bind a license to a device, replacing any previous binding.
///
/// `POST /api/admin/bind-device`
pub async fn bind_device_handler(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BindDeviceRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let (Some(key), Some(device)) = (
        str_param(payload.key.as_ref()),
        str_param(payload.device.as_ref()),
    ) else {
        return Err(LicenseError::MissingParameter("params").into());
    };

    state.registry.bind_device(key, device).await?;

    Ok(Json(OkResponse::new()))
}

/// Fetch the full stored record of a license.
///
/// `GET /api/admin/info?key=..`
pub async fn license_info_handler(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<InfoQuery>,
) -> Result<Json<InfoResponse>, ApiError> {
    let license = state
        .registry
        .info(query.key.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(InfoResponse { ok: true, license }))
}
