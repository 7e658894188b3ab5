//! Rejection response shaping.
//!
//! Every rejection pairs a JSON error body with a fresh challenge so the
//! client can retry without a separate round-trip.

use crate::challenge::Challenge;

/// Error code a host sends when a request carries no proof at all.
pub const WALLET_AUTH_REQUIRED: &str = "wallet_auth_required";

/// Description accompanying [`WALLET_AUTH_REQUIRED`].
pub const WALLET_AUTH_REQUIRED_DESCRIPTION: &str =
    "sign the challenge with your wallet key and retry";

/// A 403 rejection: the `WWW-Authenticate` value carrying a fresh
/// challenge, and the JSON body explaining the rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Value for the `WWW-Authenticate` response header.
    pub www_authenticate: String,
    /// JSON body: `{"error": code, "error_description": text}`.
    pub body: String,
}

impl Rejection {
    /// Shape a rejection around a fresh challenge.
    #[must_use]
    pub fn new(challenge: &Challenge, code: &str, description: &str) -> Self {
        let body = serde_json::json!({
            "error": code,
            "error_description": description,
        })
        .to_string();
        Self {
            www_authenticate: challenge.header_value(),
            body,
        }
    }
}
