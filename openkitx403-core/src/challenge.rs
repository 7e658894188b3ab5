//! Challenge construction, encoding, and the signing-string derivation.
//!
//! A challenge is the server's commitment to what a valid proof must cover.
//! It is issued at 403 time, carried opaquely by the client, and validated
//! on the retry; the server itself stores nothing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ServerConfig;
use crate::encoding::{
    canonical_json, decode_b64url, encode_b64url, format_timestamp, parse_timestamp,
    EncodingError,
};
use crate::nonce::RandomNonce;

/// Authentication scheme token, used in `WWW-Authenticate` and
/// `Authorization` and as the first line of the signing string.
pub const SCHEME: &str = "OpenKitx403";

/// The single supported signature algorithm identifier.
pub const SIGNATURE_ALG: &str = "ed25519-solana";

/// The single supported protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// The server's JSON commitment carried in `WWW-Authenticate`.
///
/// Field declaration order matches the byte-lexicographic key order of the
/// canonical serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Signature algorithm identifier.
    pub alg: String,
    /// Expected audience origin (scheme + host + port).
    pub aud: String,
    /// Challenge expiry, RFC 3339 seconds with `Z`.
    pub exp: String,
    /// Open-ended extension object (token gate hints, scopes).
    #[serde(default)]
    pub ext: Map<String, Value>,
    /// HTTP method this challenge is bound to.
    pub method: String,
    /// Server-random single-use value.
    pub nonce: String,
    /// Whether the retry's `Origin`/`Referer` must match `aud`.
    #[serde(rename = "originBind")]
    pub origin_bind: bool,
    /// Request path this challenge is bound to.
    pub path: String,
    /// Server identifier, also used as the realm.
    #[serde(rename = "serverId")]
    pub server_id: String,
    /// Challenge issue time, RFC 3339 seconds with `Z`.
    pub ts: String,
    /// Whether the retry must carry a `User-Agent` header.
    #[serde(rename = "uaBind")]
    pub ua_bind: bool,
    /// Protocol version.
    pub v: u32,
}

impl Challenge {
    /// Decode a challenge from its base64url header blob.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::InvalidBase64` or `EncodingError::InvalidJson`.
    pub fn decode(blob: &str) -> Result<Self, EncodingError> {
        let bytes = decode_b64url(blob)?;
        serde_json::from_slice(&bytes).map_err(|e| EncodingError::InvalidJson(e.to_string()))
    }

    /// The canonical JSON serialization: sorted keys, no whitespace.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        let value =
            serde_json::to_value(self).expect("challenge serialization cannot fail");
        canonical_json(&value)
    }

    /// The base64url of the canonical JSON; this is what appears in headers.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_b64url(self.canonical_json().as_bytes())
    }

    /// The `WWW-Authenticate` header value carrying this challenge.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!(
            "{SCHEME} realm=\"{}\", version=\"{}\", challenge=\"{}\"",
            self.server_id,
            self.v,
            self.encode()
        )
    }

    /// The byte string the client signs and the server reconstructs.
    ///
    /// Line separator is a single `\n`; the blank line before `payload:` is
    /// part of the format. Any deviation in whitespace, key order, or line
    /// breaks makes signatures incompatible.
    #[must_use]
    pub fn signing_string(&self) -> String {
        format!(
            "{SCHEME} Challenge\n\
             \n\
             domain: {}\n\
             server: {}\n\
             nonce: {}\n\
             ts: {}\n\
             method: {}\n\
             path: {}\n\
             \n\
             payload: {}",
            self.aud,
            self.server_id,
            self.nonce,
            self.ts,
            self.method,
            self.path,
            self.canonical_json()
        )
    }

    /// Parse the issue time claim.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::InvalidTimestamp` if the claim is malformed.
    pub fn issued_at(&self) -> Result<DateTime<Utc>, EncodingError> {
        parse_timestamp(&self.ts)
    }

    /// Parse the expiry claim.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError::InvalidTimestamp` if the claim is malformed.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, EncodingError> {
        parse_timestamp(&self.exp)
    }
}

/// Builds challenges for a server's configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeBuilder<'a> {
    config: &'a ServerConfig,
}

impl<'a> ChallengeBuilder<'a> {
    /// Create a builder over the given configuration.
    #[must_use]
    pub fn new(config: &'a ServerConfig) -> Self {
        Self { config }
    }

    /// Build a fresh challenge for the given request, issued now.
    ///
    /// Two successive calls with identical inputs differ only in `nonce`
    /// and `ts`/`exp`.
    #[must_use]
    pub fn build(&self, method: &str, path: &str, ext: Option<Map<String, Value>>) -> Challenge {
        self.build_at(Utc::now(), method, path, ext)
    }

    /// Build a challenge with an explicit issue time.
    #[must_use]
    pub fn build_at(
        &self,
        issued_at: DateTime<Utc>,
        method: &str,
        path: &str,
        ext: Option<Map<String, Value>>,
    ) -> Challenge {
        let expires_at = issued_at + Duration::seconds(i64::from(self.config.ttl_seconds));
        Challenge {
            alg: SIGNATURE_ALG.to_string(),
            aud: self.config.audience.clone(),
            exp: format_timestamp(expires_at),
            ext: ext.unwrap_or_default(),
            method: method.to_string(),
            nonce: RandomNonce::generate().into_string(),
            origin_bind: self.config.origin_binding,
            path: path.to_string(),
            server_id: self.config.issuer.clone(),
            ts: format_timestamp(issued_at),
            ua_bind: self.config.ua_binding,
            v: PROTOCOL_VERSION,
        }
    }
}
