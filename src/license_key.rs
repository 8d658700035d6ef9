//! License key generation.
//!
//! Generated keys have the format `PREFIX-PLAN-XXXXXXXX` where:
//! - `PREFIX` is the configured prefix (`SKU` by default)
//! - `PLAN` is the license plan, upper-cased
//! - `XXXXXXXX` is eight random uppercase hex characters
//!
//! Callers may also supply their own key; it is trimmed and used verbatim.
//!
//! # Example
//!
//! ```
//! use licreg::license_key::generate_license_key;
//!
//! let key = generate_license_key("SKU", "test");
//! assert!(key.starts_with("SKU-TEST-"));
//! assert_eq!(key.len(), "SKU-TEST-".len() + 8);
//! ```

use rand::Rng;

/// Character set for the random suffix.
const SUFFIX_CHARSET: &[u8] = b"0123456789ABCDEF";

/// Length of the random suffix.
pub const SUFFIX_LENGTH: usize = 8;

fn generate_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..SUFFIX_CHARSET.len());
            SUFFIX_CHARSET[idx] as char
        })
        .collect()
}

/// Generate a key for a license on `plan`.
pub fn generate_license_key(prefix: &str, plan: &str) -> String {
    format!("{}-{}-{}", prefix, plan.to_uppercase(), generate_suffix())
}

/// Normalize a caller-supplied key.
///
/// Returns `None` when the key is absent or blank, meaning one should be
/// generated instead.
pub fn normalize_supplied_key(key: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}
