pub mod health;
pub mod stream;
pub mod swarms;
pub mod workers;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::http::error::ApiError;

/// Allowlist for externally-supplied ids - alphanumeric, dash, underscore.
static ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid id validation regex"));

/// Validate a path id before it reaches a lookup.
pub fn validate_id(label: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} must not be empty", label)));
    }
    if value.len() > 128 {
        return Err(ApiError::bad_request(format!("{} is too long", label)));
    }
    if !ID_REGEX.is_match(value) {
        return Err(ApiError::bad_request(format!(
            "Invalid {}: must contain only alphanumeric characters, dashes, and underscores",
            label
        )));
    }
    Ok(())
}
