//! Normalization and validation of ISO codes and identifier lists.

use crate::error::AppError;
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::LazyLock;

static CURRENCY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{3}$").expect("valid currency regex"));

static ISO_2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}$").expect("valid iso_2 regex"));

static ISO_3: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{3}$").expect("valid iso_3 regex"));

/// Lower-cases and checks an ISO 4217 currency code (`"USD"` -> `"usd"`).
///
/// # Errors
///
/// Returns [`AppError::Validation`] unless the code is exactly three ASCII letters.
pub fn normalize_currency_code(code: &str) -> Result<String, AppError> {
    let normalized = code.trim().to_ascii_lowercase();
    if !CURRENCY_CODE.is_match(&normalized) {
        return Err(AppError::bad_request(
            "Currency code must be three letters",
            json!({ "currency_code": code }),
        ));
    }
    Ok(normalized)
}

/// Lower-cases and checks a two-letter country code.
///
/// # Errors
///
/// Returns [`AppError::Validation`] unless the code is exactly two ASCII letters.
pub fn normalize_iso_2(code: &str) -> Result<String, AppError> {
    let normalized = code.trim().to_ascii_lowercase();
    if !ISO_2.is_match(&normalized) {
        return Err(AppError::bad_request(
            "Country iso_2 must be two letters",
            json!({ "iso_2": code }),
        ));
    }
    Ok(normalized)
}

/// Lower-cases and checks a three-letter country code.
///
/// # Errors
///
/// Returns [`AppError::Validation`] unless the code is exactly three ASCII letters.
pub fn normalize_iso_3(code: &str) -> Result<String, AppError> {
    let normalized = code.trim().to_ascii_lowercase();
    if !ISO_3.is_match(&normalized) {
        return Err(AppError::bad_request(
            "Country iso_3 must be three letters",
            json!({ "iso_3": code }),
        ));
    }
    Ok(normalized)
}

/// Trims provider ids, rejects blanks and drops repeats while keeping first-seen order.
///
/// # Errors
///
/// Returns [`AppError::Validation`] if any id is empty after trimming.
pub fn normalize_provider_ids(field: &str, ids: Vec<String>) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(ids.len());

    for (index, raw) in ids.into_iter().enumerate() {
        let id = raw.trim();
        if id.is_empty() {
            return Err(AppError::bad_request(
                "Provider id must not be empty",
                json!({ "field": field, "index": index }),
            ));
        }
        if seen.insert(id.to_string()) {
            out.push(id.to_string());
        }
    }

    Ok(out)
}
