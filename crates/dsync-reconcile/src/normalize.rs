//! Number canonicalization.
//!
//! Rules, in order:
//! 1. Strip every non-digit character.
//! 2. 11 digits with a leading `1` → drop the country code.
//! 3. 10 digits → as-is.
//! 4. More than 11 digits → keep the last 10 (best-effort shim for malformed
//!    international prefixes; not a guaranteed-correct parse).
//! 5. Anything else is invalid.
//! 6. The 10-digit result must match `^[2-9]\d{9}$`.

use crate::DidNumber;

/// Canonicalize `raw` into a [`DidNumber`], or `None` if it cannot be.
///
/// Pure and total: never panics, never allocates more than one string.
/// Idempotent on canonical input.
pub fn normalize(raw: &str) -> Option<DidNumber> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let ten = match digits.len() {
        11 if digits.starts_with('1') => &digits[1..],
        10 => digits.as_str(),
        n if n > 11 => &digits[n - 10..],
        _ => return None,
    };

    if !ten.starts_with(|c: char| ('2'..='9').contains(&c)) {
        return None;
    }

    Some(DidNumber::from_canonical(ten.to_string()))
}

/// Trim a raw branded name; blank becomes absent.
pub fn clean_branded_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Registry labels are compared as stored: only the empty string becomes
/// absent. Surrounding whitespace survives so it shows up as a mismatch.
pub fn registry_branded_name(raw: Option<&str>) -> Option<String> {
    raw.filter(|s| !s.is_empty()).map(str::to_string)
}
