//! Header parsing for the `OpenKitx403` scheme.
//!
//! Both protocol headers share one grammar: the scheme token followed by
//! comma-separated `key="value"` parameters. `Authorization` carries the
//! client's proof; `WWW-Authenticate` carries the server's challenge.
//!
//! Values are quoted strings with no embedded quotes or backslashes.
//! Unknown keys are ignored; duplicate keys take the last value.

use std::collections::HashMap;

use crate::challenge::SCHEME;

/// Errors from parsing protocol headers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The header does not begin with the scheme token.
    #[error("missing or wrong authentication scheme")]
    WrongScheme,

    /// A parameter is not of the form `key="value"`.
    #[error("malformed parameter: {0}")]
    MalformedParameter(String),

    /// A required parameter is absent.
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// The client's proof, parsed from an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationParams {
    /// base58 wallet address (32-byte public key).
    pub addr: String,
    /// base58 Ed25519 signature (64 bytes).
    pub sig: String,
    /// Echo of the base64url challenge blob the server issued.
    pub challenge: String,
    /// Client timestamp, RFC 3339 seconds with `Z`.
    pub ts: String,
    /// Client-random single-use value.
    pub nonce: String,
    /// Optional `METHOD:PATH` the proof is bound to.
    pub bind: Option<String>,
}

impl AuthorizationParams {
    /// Re-emit the header value. Parsing the result yields an equivalent
    /// parameter set.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut value = format!(
            "{SCHEME} addr=\"{}\", sig=\"{}\", challenge=\"{}\", ts=\"{}\", nonce=\"{}\"",
            self.addr, self.sig, self.challenge, self.ts, self.nonce
        );
        if let Some(bind) = &self.bind {
            value.push_str(&format!(", bind=\"{bind}\""));
        }
        value
    }
}

/// The server's challenge, parsed from a `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeHeader {
    /// Realm, equal to the server identifier.
    pub realm: String,
    /// Protocol version string.
    pub version: String,
    /// base64url challenge blob.
    pub challenge: String,
}

/// Parse the parameter list shared by both protocol headers.
///
/// # Errors
///
/// Returns `ParseError::WrongScheme` if the scheme token (with its trailing
/// space) is absent, or `ParseError::MalformedParameter` for anything that
/// is not a well-formed quoted pair.
pub fn parse_params(header: &str) -> Result<HashMap<String, String>, ParseError> {
    // Scheme match is case-sensitive.
    let rest = header
        .strip_prefix(SCHEME)
        .and_then(|r| r.strip_prefix(' '))
        .ok_or(ParseError::WrongScheme)?;

    let mut params = HashMap::new();
    for part in rest.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ParseError::MalformedParameter(part.to_string()));
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| ParseError::MalformedParameter(part.to_string()))?;
        let key = key.trim();
        let value = value.trim();
        let inner = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .ok_or_else(|| ParseError::MalformedParameter(part.to_string()))?;
        if key.is_empty() || inner.contains('"') || inner.contains('\\') {
            return Err(ParseError::MalformedParameter(part.to_string()));
        }
        // Last value wins on duplicates.
        params.insert(key.to_string(), inner.to_string());
    }
    Ok(params)
}

fn require(
    params: &mut HashMap<String, String>,
    key: &'static str,
) -> Result<String, ParseError> {
    params.remove(key).ok_or(ParseError::MissingParameter(key))
}

/// Parse an `Authorization` header into the client's proof parameters.
///
/// # Errors
///
/// Returns a `ParseError` for a wrong scheme, malformed parameters, or a
/// missing required key (`addr`, `sig`, `challenge`, `ts`, `nonce`).
pub fn parse_authorization(header: &str) -> Result<AuthorizationParams, ParseError> {
    let mut params = parse_params(header)?;
    Ok(AuthorizationParams {
        addr: require(&mut params, "addr")?,
        sig: require(&mut params, "sig")?,
        challenge: require(&mut params, "challenge")?,
        ts: require(&mut params, "ts")?,
        nonce: require(&mut params, "nonce")?,
        bind: params.remove("bind"),
    })
}

/// Parse a `WWW-Authenticate` header into the server's challenge parameters.
///
/// # Errors
///
/// Returns a `ParseError` for a wrong scheme, malformed parameters, or a
/// missing required key (`realm`, `version`, `challenge`).
pub fn parse_www_authenticate(header: &str) -> Result<ChallengeHeader, ParseError> {
    let mut params = parse_params(header)?;
    Ok(ChallengeHeader {
        realm: require(&mut params, "realm")?,
        version: require(&mut params, "version")?,
        challenge: require(&mut params, "challenge")?,
    })
}
