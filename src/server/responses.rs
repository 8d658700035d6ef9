//! Success envelopes for the HTTP API.
//!
//! Every body carries an `ok` flag. Timestamps use ISO 8601 in UTC with
//! millisecond precision, e.g. `2025-01-31T12:00:00.000Z`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::database::License;
use crate::server::registry::{Verification, VerifyFailure};

/// Serde adapter for `DateTime<Utc>` as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }
}

/// `{ "ok": true }`
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of `POST /api/admin/create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub ok: bool,
    pub key: String,
    pub plan: String,
    #[serde(with = "iso_millis")]
    pub expires_at: DateTime<Utc>,
    pub device: Option<String>,
}

impl From<License> for CreateResponse {
    fn from(license: License) -> Self {
        Self {
            ok: true,
            key: license.key,
            plan: license.plan,
            expires_at: license.expires_at,
            device: license.device,
        }
    }
}

/// Body of `POST /api/admin/extend`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendResponse {
    pub ok: bool,
    pub key: String,
    #[serde(with = "iso_millis")]
    pub expires_at: DateTime<Utc>,
}

/// Body of `GET /api/admin/info`.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub ok: bool,
    pub license: License,
}

/// Body of `GET /api/license/verify`.
///
/// Either `{ok:false, reason}` when the license can't be checked, or
/// `{ok, plan, expiresAt}` where `ok` reflects expiry.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VerifyResponse {
    Rejected {
        ok: bool,
        reason: VerifyFailure,
    },
    #[serde(rename_all = "camelCase")]
    Checked {
        ok: bool,
        plan: String,
        #[serde(with = "iso_millis")]
        expires_at: DateTime<Utc>,
    },
}

impl From<Verification> for VerifyResponse {
    fn from(verification: Verification) -> Self {
        match verification {
            Verification::Rejected(reason) => VerifyResponse::Rejected { ok: false, reason },
            Verification::Checked {
                valid,
                plan,
                expires_at,
            } => VerifyResponse::Checked {
                ok: valid,
                plan,
                expires_at,
            },
        }
    }
}
