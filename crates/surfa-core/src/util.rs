//! Identifier, timestamp and key helpers

use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};

/// Accepted ingest key prefixes
pub const INGEST_KEY_PREFIXES: [&str; 2] = ["sk_live_", "sk_test_"];

/// Minimum ingest key length, prefix included
pub const MIN_INGEST_KEY_LEN: usize = 20;

/// Generate a unique session ID (UUIDv4, hyphenated)
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time as ISO-8601 with a literal `Z` suffix,
/// e.g. `2026-01-29T20:00:00.123456Z`
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Validate the ingest key format.
///
/// Keys must be non-empty, start with `sk_live_` or `sk_test_`, and be at
/// least [`MIN_INGEST_KEY_LEN`] characters long.
pub fn validate_ingest_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Config(
            "Invalid ingest key: Ingest key cannot be empty".to_string(),
        ));
    }

    if !INGEST_KEY_PREFIXES.iter().any(|p| key.starts_with(p)) {
        return Err(Error::Config(
            "Invalid ingest key: Ingest key must start with 'sk_live_' or 'sk_test_'".to_string(),
        ));
    }

    if key.chars().count() < MIN_INGEST_KEY_LEN {
        return Err(Error::Config(
            "Invalid ingest key: Ingest key is too short".to_string(),
        ));
    }

    Ok(())
}

/// Mask a key for logs and debug output, keeping only its prefix
pub fn mask_key(key: &str) -> String {
    match INGEST_KEY_PREFIXES.iter().find(|p| key.starts_with(*p)) {
        Some(prefix) => format!("{prefix}***"),
        None => "***".to_string(),
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
