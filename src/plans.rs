//! License plans and expiry arithmetic.
//!
//! A plan is an informational tag stored with every license. The well-known
//! plans also pick the default lifetime of a new license when the caller
//! doesn't give an explicit number of days:
//!
//! | plan    | days |
//! |---------|------|
//! | `test`  | 3    |
//! | `week`  | 7    |
//! | `month` | 30   |
//! | `year`  | 365  |
//!
//! Any other plan name is accepted as-is and gets [`DEFAULT_DAYS`].

use chrono::{DateTime, TimeDelta, Utc};

use crate::errors::{LicenseError, LicenseResult};

/// Plan used when the caller doesn't name one.
pub const DEFAULT_PLAN: &str = "month";

/// Lifetime for plans without a fixed mapping.
pub const DEFAULT_DAYS: f64 = 30.0;

/// Days added by `extend` when the caller doesn't say.
pub const DEFAULT_EXTEND_DAYS: f64 = 30.0;

/// Largest accepted magnitude for a day offset (about a century).
pub const MAX_DAYS: f64 = 36_500.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// The well-known plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Test,
    Week,
    Month,
    Year,
}

impl Plan {
    /// Look up a well-known plan by its tag. Tags are case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "test" => Some(Plan::Test),
            "week" => Some(Plan::Week),
            "month" => Some(Plan::Month),
            "year" => Some(Plan::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Test => "test",
            Plan::Week => "week",
            Plan::Month => "month",
            Plan::Year => "year",
        }
    }

    /// Default lifetime of a license on this plan.
    pub fn days(&self) -> f64 {
        match self {
            Plan::Test => 3.0,
            Plan::Week => 7.0,
            Plan::Month => 30.0,
            Plan::Year => 365.0,
        }
    }
}

/// Resolve the lifetime of a new license.
///
/// An explicit finite `days` wins; otherwise the plan mapping; otherwise
/// [`DEFAULT_DAYS`].
pub fn resolve_days(plan: &str, days: Option<f64>) -> f64 {
    match days {
        Some(d) if d.is_finite() => d,
        _ => Plan::from_tag(plan).map_or(DEFAULT_DAYS, |p| p.days()),
    }
}

/// Convert a (possibly fractional) number of days into a `TimeDelta`.
pub fn days_to_delta(days: f64) -> LicenseResult<TimeDelta> {
    if !days.is_finite() || days.abs() > MAX_DAYS {
        return Err(LicenseError::InvalidInput(format!(
            "days must be a number between -{MAX_DAYS} and {MAX_DAYS}"
        )));
    }

    let millis = (days * MILLIS_PER_DAY).round() as i64;
    TimeDelta::try_milliseconds(millis)
        .ok_or_else(|| LicenseError::InvalidInput(format!("days out of range: {days}")))
}

/// `from + days`, failing instead of overflowing.
pub fn add_days(from: DateTime<Utc>, days: f64) -> LicenseResult<DateTime<Utc>> {
    let delta = days_to_delta(days)?;
    from.checked_add_signed(delta)
        .ok_or_else(|| LicenseError::InvalidInput(format!("days out of range: {days}")))
}
