// src/server/mod.rs

//! Server-side components of the license registry.
//!
//! This module contains:
//! - `database`    → DB abstraction over SQLite/Postgres
//! - `registry`    → License lifecycle rules (create/extend/revoke/bind/verify)
//! - `handlers`    → Public HTTP handlers and shared state
//! - `admin`       → Admin HTTP handlers
//! - `routes`      → Router builder
//! - `extract`     → Body/query extractors with JSON rejections
//! - `api_error`   → The `{ok:false, error}` envelope
//! - `responses`   → Success envelopes
//! - `logging`     → Request logging middleware and license events
//! - `validation`  → Request validation utilities

pub mod admin;
pub mod api_error;
pub mod database;
pub mod extract;
pub mod handlers;
pub mod logging;
pub mod registry;
pub mod responses;
pub mod routes;
pub mod validation;

pub use admin::{
    bind_device_handler, create_license_handler, extend_license_handler, license_info_handler,
    set_active_handler, BindDeviceRequest, CreateLicenseRequest, ExtendLicenseRequest, InfoQuery,
    SetActiveRequest,
};
pub use api_error::{ApiError, ErrorCode};
pub use database::{Database, License, NewLicense};
pub use extract::{JsonBody, QueryParams};
pub use handlers::{ping_handler, verify_handler, AppState, VerifyQuery};
pub use registry::{evaluate, CreateLicense, LicenseRegistry, Verification, VerifyFailure};
pub use responses::{CreateResponse, ExtendResponse, InfoResponse, OkResponse, VerifyResponse};
pub use routes::{build_router, cors_layer};
pub use validation::{ValidationError, ValidationResult};
