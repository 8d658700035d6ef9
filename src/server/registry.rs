//! The license registry: lifecycle rules for issuing, extending, revoking,
//! binding and verifying licenses.
//!
//! Handlers translate HTTP requests into calls on [`LicenseRegistry`]; all
//! business rules live here. Each operation runs at most one SQL statement
//! on success (create may retry its INSERT when a generated key collides;
//! a refused extend looks the key up to tell why).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::errors::{LicenseError, LicenseResult};
use crate::license_key::{generate_license_key, normalize_supplied_key};
use crate::plans::{add_days, days_to_delta, resolve_days, DEFAULT_PLAN};
use crate::server::database::{Database, License, NewLicense, LATEST_EXPIRY};
use crate::server::logging::{log_license_event, LicenseEvent};
use crate::server::validation::{
    validate_max_length, validate_optional_max_length, MAX_DEVICE_LENGTH, MAX_KEY_LENGTH,
    MAX_NOTE_LENGTH, MAX_PLAN_LENGTH,
};

/// Attempts at finding an unused generated key before giving up.
const MAX_KEY_ATTEMPTS: usize = 5;

/// Arguments of [`LicenseRegistry::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateLicense {
    /// Plan tag; `month` when absent or blank
    pub plan: Option<String>,
    /// Explicit lifetime in days; the plan default applies when absent
    pub days: Option<f64>,
    /// Caller-chosen key; generated when absent or blank
    pub key: Option<String>,
    pub note: Option<String>,
    /// Device to bind right away
    pub device: Option<String>,
}

/// Why a license could not be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    MissingKey,
    NotFound,
    Revoked,
    BoundToOtherDevice,
}

impl VerifyFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyFailure::MissingKey => "missing_key",
            VerifyFailure::NotFound => "not_found",
            VerifyFailure::Revoked => "revoked",
            VerifyFailure::BoundToOtherDevice => "bound_to_other_device",
        }
    }
}

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The license could not be checked at all.
    Rejected(VerifyFailure),
    /// The license was checked; `valid` is false once it has expired.
    Checked {
        valid: bool,
        plan: String,
        expires_at: DateTime<Utc>,
    },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Checked { valid: true, .. })
    }
}

/// Decide a verification for a stored license at instant `now`.
///
/// The device check only applies when both the license and the caller name
/// a (non-empty) device.
pub fn evaluate(license: &License, device: Option<&str>, now: DateTime<Utc>) -> Verification {
    if !license.is_active {
        return Verification::Rejected(VerifyFailure::Revoked);
    }

    let requested = device.filter(|d| !d.is_empty());
    if let (Some(bound), Some(requested)) = (license.device.as_deref(), requested) {
        if license.is_bound() && bound != requested {
            return Verification::Rejected(VerifyFailure::BoundToOtherDevice);
        }
    }

    Verification::Checked {
        valid: now < license.expires_at,
        plan: license.plan.clone(),
        expires_at: license.expires_at,
    }
}

/// The license registry service.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct LicenseRegistry {
    db: Arc<Database>,
    key_prefix: String,
}

impl LicenseRegistry {
    pub fn new(db: Arc<Database>, key_prefix: impl Into<String>) -> Self {
        Self {
            db,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Issue a new, active license.
    ///
    /// A caller-supplied key that is already taken is `InvalidInput`.
    pub async fn create(&self, request: CreateLicense) -> LicenseResult<License> {
        let plan = request
            .plan
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLAN.to_string());
        let supplied_key = normalize_supplied_key(request.key.as_deref());
        let device = request.device.filter(|d| !d.is_empty());

        validate_max_length(&plan, MAX_PLAN_LENGTH, "plan")?;
        validate_optional_max_length(supplied_key.as_deref(), MAX_KEY_LENGTH, "key")?;
        validate_optional_max_length(device.as_deref(), MAX_DEVICE_LENGTH, "device")?;
        validate_optional_max_length(request.note.as_deref(), MAX_NOTE_LENGTH, "note")?;

        let now = Utc::now();
        let days = resolve_days(&plan, request.days);
        let expires_at = add_days(now, days)?;

        let mut new_license = NewLicense {
            key: String::new(),
            plan,
            expires_at,
            device,
            note: request.note,
            created_at: now,
        };

        let license = match supplied_key {
            Some(key) => {
                new_license.key = key;
                self.db
                    .insert_license(&new_license)
                    .await?
                    .ok_or_else(|| {
                        LicenseError::InvalidInput(format!(
                            "license key already exists: {}",
                            new_license.key
                        ))
                    })?
            }
            None => self.insert_with_generated_key(&mut new_license).await?,
        };

        log_license_event(
            LicenseEvent::Created,
            &license.key,
            license.device.as_deref(),
            Some(&format!("plan={} days={}", license.plan, days)),
        );

        Ok(license)
    }

    async fn insert_with_generated_key(
        &self,
        new_license: &mut NewLicense,
    ) -> LicenseResult<License> {
        for _ in 0..MAX_KEY_ATTEMPTS {
            new_license.key = generate_license_key(&self.key_prefix, &new_license.plan);
            if let Some(license) = self.db.insert_license(new_license).await? {
                return Ok(license);
            }
            warn!("Generated license key {} already exists, retrying", new_license.key);
        }

        Err(LicenseError::InvalidInput(format!(
            "failed to generate unique license key after {MAX_KEY_ATTEMPTS} attempts"
        )))
    }

    /// Push a license's expiry to `max(now, expires_at) + days`.
    ///
    /// `days` must be non-negative so an extension never shortens a license.
    /// An extension that would land after [`LATEST_EXPIRY`] is `InvalidInput`
    /// and leaves the license untouched.
    pub async fn extend(&self, key: &str, days: f64) -> LicenseResult<DateTime<Utc>> {
        if key.is_empty() {
            return Err(LicenseError::MissingParameter("key"));
        }
        if days < 0.0 {
            return Err(LicenseError::InvalidInput("days must not be negative".to_string()));
        }
        days_to_delta(days)?;

        let Some(expires_at) = self.db.extend_license(key, Utc::now(), days).await? else {
            return match self.db.get_license(key).await? {
                Some(_) => Err(LicenseError::InvalidInput(format!(
                    "extension would move expiry past {LATEST_EXPIRY}"
                ))),
                None => Err(LicenseError::NotFound(key.to_string())),
            };
        };

        log_license_event(
            LicenseEvent::Extended,
            key,
            None,
            Some(&format!("days={days} expires_at={}", expires_at.to_rfc3339())),
        );

        Ok(expires_at)
    }

    /// Activate or revoke a license.
    pub async fn set_active(&self, key: &str, is_active: bool) -> LicenseResult<()> {
        if key.is_empty() {
            return Err(LicenseError::MissingParameter("params"));
        }

        if !self.db.set_active(key, is_active).await? {
            return Err(LicenseError::NotFound(key.to_string()));
        }

        let event = if is_active {
            LicenseEvent::Activated
        } else {
            LicenseEvent::Revoked
        };
        log_license_event(event, key, None, None);

        Ok(())
    }

    /// Bind a license to `device`, replacing any earlier binding.
    pub async fn bind_device(&self, key: &str, device: &str) -> LicenseResult<()> {
        if key.is_empty() || device.is_empty() {
            return Err(LicenseError::MissingParameter("params"));
        }
        validate_max_length(device, MAX_DEVICE_LENGTH, "device")?;

        if !self.db.bind_device(key, device).await? {
            return Err(LicenseError::NotFound(key.to_string()));
        }

        log_license_event(LicenseEvent::DeviceBound, key, Some(device), None);

        Ok(())
    }

    /// The full stored record.
    pub async fn info(&self, key: &str) -> LicenseResult<License> {
        if key.is_empty() {
            return Err(LicenseError::MissingParameter("key"));
        }

        self.db
            .get_license(key)
            .await?
            .ok_or_else(|| LicenseError::NotFound(key.to_string()))
    }

    /// Check whether `key` currently grants access, optionally from `device`.
    ///
    /// Business-rule failures are reported in the returned [`Verification`];
    /// only store failures are errors.
    pub async fn verify(
        &self,
        key: Option<&str>,
        device: Option<&str>,
    ) -> LicenseResult<Verification> {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            log_license_event(
                LicenseEvent::VerificationFailed,
                "",
                device,
                Some(VerifyFailure::MissingKey.as_str()),
            );
            return Ok(Verification::Rejected(VerifyFailure::MissingKey));
        };

        let verification = match self.db.get_license(key).await? {
            Some(license) => evaluate(&license, device, Utc::now()),
            None => Verification::Rejected(VerifyFailure::NotFound),
        };

        let (event, outcome) = match &verification {
            Verification::Rejected(reason) => (LicenseEvent::VerificationFailed, reason.as_str()),
            Verification::Checked { valid: true, .. } => (LicenseEvent::Verified, "valid"),
            Verification::Checked { valid: false, .. } => (LicenseEvent::Verified, "expired"),
        };
        log_license_event(event, key, device, Some(outcome));

        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn license(device: Option<&str>, is_active: bool, expires_in: TimeDelta) -> License {
        let now = Utc::now();
        License {
            id: 1,
            key: "SKU-MONTH-0000ABCD".to_string(),
            plan: "month".to_string(),
            expires_at: now + expires_in,
            device: device.map(String::from),
            is_active,
            note: None,
            created_at: now,
        }
    }

    #[test]
    fn revoked_wins_over_everything() {
        let l = license(Some("dev-a"), false, TimeDelta::days(10));
        assert_eq!(
            evaluate(&l, Some("dev-b"), Utc::now()),
            Verification::Rejected(VerifyFailure::Revoked)
        );
        let expired = license(None, false, TimeDelta::days(-10));
        assert_eq!(
            evaluate(&expired, None, Utc::now()),
            Verification::Rejected(VerifyFailure::Revoked)
        );
    }

    #[test]
    fn mismatched_device_is_rejected() {
        let l = license(Some("dev-a"), true, TimeDelta::days(10));
        assert_eq!(
            evaluate(&l, Some("dev-b"), Utc::now()),
            Verification::Rejected(VerifyFailure::BoundToOtherDevice)
        );
    }

    #[test]
    fn matching_or_absent_device_passes() {
        let l = license(Some("dev-a"), true, TimeDelta::days(10));
        assert!(evaluate(&l, Some("dev-a"), Utc::now()).is_valid());
        assert!(evaluate(&l, None, Utc::now()).is_valid());
        assert!(evaluate(&l, Some(""), Utc::now()).is_valid());
    }

    #[test]
    fn unbound_license_accepts_any_device() {
        let l = license(None, true, TimeDelta::days(10));
        assert!(evaluate(&l, Some("anything"), Utc::now()).is_valid());

        let blank = license(Some(""), true, TimeDelta::days(10));
        assert!(evaluate(&blank, Some("anything"), Utc::now()).is_valid());
    }

    #[test]
    fn expired_license_is_checked_but_invalid() {
        let l = license(None, true, TimeDelta::seconds(-1));
        match evaluate(&l, None, Utc::now()) {
            Verification::Checked {
                valid,
                plan,
                expires_at,
            } => {
                assert!(!valid);
                assert_eq!(plan, "month");
                assert_eq!(expires_at, l.expires_at);
            }
            other => panic!("unexpected verification: {other:?}"),
        }
    }

    #[test]
    fn expiry_instant_itself_is_invalid() {
        let l = license(None, true, TimeDelta::zero());
        assert!(!evaluate(&l, None, l.expires_at).is_valid());
    }

    #[test]
    fn failure_codes_match_wire_names() {
        for failure in [
            VerifyFailure::MissingKey,
            VerifyFailure::NotFound,
            VerifyFailure::Revoked,
            VerifyFailure::BoundToOtherDevice,
        ] {
            assert_eq!(
                serde_json::to_value(failure).unwrap(),
                serde_json::Value::String(failure.as_str().to_string())
            );
        }
    }
}
