//! Wire encoding primitives.
//!
//! Everything the protocol puts on the wire flows through here:
//!
//! - base64url (RFC 4648) without padding, pad-tolerant on decode
//! - canonical JSON: byte-lexicographic key order, no insignificant
//!   whitespace, UTF-8
//! - RFC 3339 timestamps truncated to second precision with a `Z` suffix
//!
//! The challenge blob carried in headers is the base64url of the canonical
//! JSON, and the signing string embeds that same canonical JSON, so any
//! deviation here breaks signature compatibility between implementations.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Strict timestamp format: fractional seconds and non-`Z` offsets rejected.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EncodingError {
    /// The string is not valid base64url.
    #[error("invalid base64url encoding")]
    InvalidBase64,

    /// The bytes are not valid JSON for the expected shape.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    /// The timestamp is not `YYYY-MM-DDTHH:MM:SSZ`.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Encode bytes as base64url without padding.
#[must_use]
pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url, tolerating the padded variant older clients emit.
///
/// # Errors
///
/// Returns `EncodingError::InvalidBase64` for anything else malformed.
pub fn decode_b64url(s: &str) -> Result<Vec<u8>, EncodingError> {
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|_| EncodingError::InvalidBase64)
}

/// Format a timestamp as second-precision RFC 3339 with a `Z` suffix.
#[must_use]
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a second-precision RFC 3339 `Z` timestamp.
///
/// Fractional seconds, numeric offsets, and a missing `Z` are all rejected:
/// both sides must agree on the exact byte form because timestamps appear
/// in the signing string.
///
/// # Errors
///
/// Returns `EncodingError::InvalidTimestamp` on any deviation.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, EncodingError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| EncodingError::InvalidTimestamp(s.to_string()))
}

/// Serialize a JSON value canonically: object keys in byte-lexicographic
/// order, no whitespace between tokens.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_scalar(&Value::String((*key).clone()), out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut String) {
    // Scalars (null, bool, number, string) have a single compact JSON form.
    let rendered =
        serde_json::to_string(value).expect("scalar JSON serialization cannot fail");
    out.push_str(&rendered);
}
