use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::config::CorsConfig;
use crate::server::admin::{
    bind_device_handler, create_license_handler, extend_license_handler, license_info_handler,
    set_active_handler,
};
use crate::server::handlers::{
    method_not_allowed_handler, not_found_handler, ping_handler, verify_handler, AppState,
};
use crate::server::logging::request_logging_middleware;

/// Build the application router.
///
/// # Routes
///
/// ## Public
/// - `GET /api/license/verify` - Check a license (optionally for a device)
/// - `GET /api/ping` - Liveness check
///
/// ## Admin
/// - `POST /api/admin/create` - Issue a license
/// - `POST /api/admin/extend` - Extend a license
/// - `POST /api/admin/set-active` - Revoke or reactivate a license
/// - `POST /api/admin/bind-device` - Bind a license to a device
/// - `GET /api/admin/info` - Full license record
///
/// A wrong verb on any of these paths answers 405 and an unknown path 404,
/// both with the usual `{ok:false, error}` body.
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route(
            "/api/license/verify",
            get(verify_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/ping",
            get(ping_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/admin/create",
            post(create_license_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/admin/extend",
            post(extend_license_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/admin/set-active",
            post(set_active_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/admin/bind-device",
            post(bind_device_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/admin/info",
            get(license_info_handler).fallback(method_not_allowed_handler),
        )
        .fallback(not_found_handler)
        .layer(cors_layer(cors))
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}

/// CORS policy: any method and header, from the configured origin.
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if cors.origin == "*" {
        return layer.allow_origin(Any);
    }

    match HeaderValue::from_str(&cors.origin) {
        Ok(origin) => layer.allow_origin(AllowOrigin::exact(origin)),
        Err(e) => {
            warn!("Invalid CORS origin {:?} ({e}); cross-origin requests disabled", cors.origin);
            layer
        }
    }
}
