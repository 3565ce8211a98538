use once_cell::sync::Lazy;
use regex::Regex;

use crate::{error::ApiError, utils::kood};

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]+$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 6;

/// Trims optional free text; blank becomes `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Blank phone numbers are treated as absent.
pub fn clean_phone(tel: Option<&str>) -> Result<Option<String>, ApiError> {
    match clean_text(tel) {
        Some(t) if !PHONE_PATTERN.is_match(&t) => Err(ApiError::bad_request(
            "Phone number must contain only digits and optional leading +.",
        )),
        other => Ok(other),
    }
}

pub fn check_password(pass: &str) -> Result<(), ApiError> {
    if pass.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters long.",
        ));
    }
    Ok(())
}

pub fn check_kood(value: &str) -> Result<(), ApiError> {
    kood::validate(value).map_err(|e| ApiError::bad_request(e.message()))
}

/// Returns the trimmed value, or a 400 naming `field` when blank.
pub fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}
