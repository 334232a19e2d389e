//! Object key derivation and sanitization.
//!
//! Keys are time-partitioned, not content-addressed: the same logical
//! document uploaded at different processing times produces different keys.
//! The pipeline intentionally does not deduplicate identical content.

use chrono::{DateTime, Utc};

/// Placeholder used when sanitization leaves nothing of the original name.
const PLACEHOLDER_NAME: &str = "unnamed_file";

/// Strips non-ASCII characters from a value.
///
/// Object-storage metadata headers commonly reject non-ASCII, so every
/// metadata value passes through here before upload.
pub fn sanitize_ascii(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

/// Produces a filesystem/URL-safe filename for use in an object key.
///
/// The result contains only `[A-Za-z0-9_]` plus dot, is non-empty, and has
/// no consecutive underscores: every other character becomes `_`, runs of
/// `_` collapse, and leading/trailing underscores are stripped.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for c in name.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '.' {
            c
        } else {
            '_'
        };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// The `YYYY/MM/DD/HHMMSS` path segment for a processing timestamp.
fn timestamp_path(processed_at: DateTime<Utc>) -> String {
    processed_at.format("%Y/%m/%d/%H%M%S").to_string()
}

/// Key for uploaded document content:
/// `{prefix}/files/{YYYY}/{MM}/{DD}/{HHMMSS}_{sanitized-name}`.
pub fn object_key(prefix: &str, processed_at: DateTime<Utc>, final_name: &str) -> String {
    format!(
        "{prefix}/files/{}_{}",
        timestamp_path(processed_at),
        sanitize_filename(final_name),
    )
}

/// Sibling key for the companion audit record: swaps the `files/` path
/// segment for `metadata/` and appends `.json`.
pub fn metadata_key(object_key: &str) -> String {
    format!("{}.json", object_key.replacen("/files/", "/metadata/", 1))
}

/// Key for the plaintext marker written when an event finds no files:
/// `{prefix}/webhook-events/{YYYY}/{MM}/{DD}/{HHMMSS}_no_files.txt`.
pub fn marker_key(prefix: &str, processed_at: DateTime<Utc>) -> String {
    format!(
        "{prefix}/webhook-events/{}_no_files.txt",
        timestamp_path(processed_at),
    )
}
