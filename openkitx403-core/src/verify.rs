//! The verification pipeline.
//!
//! Turns an incoming request plus its `Authorization` header into either an
//! authenticated wallet address or a rejection reason. The checks run in a
//! fixed order and the first failure wins; the order is part of the
//! protocol. Cheap structural checks precede the signature, policy checks
//! precede nonce consumption, and the signature precedes the token gate so
//! neither the replay store nor the gate ever sees an unauthenticated
//! proof.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::authorization::parse_authorization;
use crate::challenge::{Challenge, PROTOCOL_VERSION, SIGNATURE_ALG};
use crate::config::ServerConfig;
use crate::encoding::parse_timestamp;
use crate::gate::TokenGate;
use crate::identity::{PublicKey, Signature, WalletAddress};
use crate::replay::ReplayStore;

/// Why a verification was rejected.
///
/// A closed sum of the protocol's rejection reasons; [`code`](Self::code)
/// yields the wire identifier surfaced in rejection bodies. Failures are
/// returned, never thrown across component boundaries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// The authorization header is malformed.
    #[error("malformed authorization header")]
    InvalidRequest,

    /// The echoed challenge blob could not be decoded.
    #[error("challenge payload could not be decoded")]
    InvalidChallenge,

    /// The challenge carries an unknown protocol version.
    #[error("unsupported protocol version")]
    UnsupportedVersion,

    /// The challenge names an algorithm other than the one supported.
    #[error("unsupported signature algorithm")]
    UnsupportedAlgorithm,

    /// The challenge is past its expiry.
    #[error("challenge has expired")]
    ChallengeExpired,

    /// The challenge was issued for a different audience.
    #[error("challenge audience does not match this server")]
    AudienceMismatch,

    /// The challenge was issued by a different server.
    #[error("challenge server id does not match this server")]
    ServerIdMismatch,

    /// The client timestamp is outside the allowed skew window.
    #[error("client timestamp is outside the allowed skew window")]
    TimestampSkew,

    /// The proof is not bound to the request's method and path.
    #[error("proof is not bound to this method and path")]
    BindingMismatch,

    /// The request origin does not match the challenge audience.
    #[error("origin does not match the challenge audience")]
    OriginMismatch,

    /// The challenge requires a `User-Agent` and the request carries none.
    #[error("a user-agent header is required")]
    UserAgentRequired,

    /// The challenge nonce has already been consumed.
    #[error("challenge nonce has already been used")]
    ReplayDetected,

    /// Key or signature decoding failed, or the signature does not verify.
    #[error("signature verification failed")]
    InvalidSignature,

    /// The token gate rejected the address or could not decide.
    #[error("token gate rejected the address")]
    TokenGateFailed(Option<String>),
}

impl VerifyError {
    /// The wire error code for rejection bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidChallenge => "invalid_challenge",
            Self::UnsupportedVersion => "unsupported_version",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::ChallengeExpired => "challenge_expired",
            Self::AudienceMismatch => "audience_mismatch",
            Self::ServerIdMismatch => "server_id_mismatch",
            Self::TimestampSkew => "timestamp_skew",
            Self::BindingMismatch => "binding_mismatch",
            Self::OriginMismatch => "origin_mismatch",
            Self::UserAgentRequired => "user_agent_required",
            Self::ReplayDetected => "replay_detected",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenGateFailed(_) => "token_gate_failed",
        }
    }

    /// Human-readable description for rejection bodies, including the token
    /// gate's own reason when it supplied one.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::TokenGateFailed(Some(reason)) => {
                format!("token gate rejected the address: {reason}")
            }
            other => other.to_string(),
        }
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedRequest {
    /// The authenticated wallet address.
    pub address: WalletAddress,
    /// The decoded challenge the proof covered.
    pub challenge: Challenge,
}

/// Case-insensitive header lookup.
fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Compare two URLs by origin (scheme, host, port), so default ports
/// compare equal: `https://a.ex` and `https://a.ex:443` are one origin.
fn origins_match(audience: &str, presented: &str) -> bool {
    match (Url::parse(audience), Url::parse(presented)) {
        (Ok(audience), Ok(presented)) => {
            let audience = audience.origin();
            let presented = presented.origin();
            // Opaque origins (non-hierarchical schemes) never match.
            audience.is_tuple() && presented.is_tuple() && audience == presented
        }
        _ => false,
    }
}

/// Verify a proof against a request.
///
/// `headers` supplies the request headers for origin and user-agent
/// binding; pass `None` when the host cannot provide them, which skips
/// those two checks. `now` is supplied by the caller so the pipeline
/// itself never reads a clock.
///
/// # Errors
///
/// Returns the first failing check's [`VerifyError`].
#[allow(clippy::too_many_arguments)]
pub fn verify_request(
    config: &ServerConfig,
    replay: Option<&dyn ReplayStore>,
    gate: Option<&dyn TokenGate>,
    now: DateTime<Utc>,
    authorization: &str,
    method: &str,
    path: &str,
    headers: Option<&HashMap<String, String>>,
) -> Result<VerifiedRequest, VerifyError> {
    // 1. Parse the proof.
    let auth = parse_authorization(authorization).map_err(|_| VerifyError::InvalidRequest)?;

    // 2. Decode the echoed challenge.
    let challenge =
        Challenge::decode(&auth.challenge).map_err(|_| VerifyError::InvalidChallenge)?;

    // 3. Version.
    if challenge.v != PROTOCOL_VERSION {
        return Err(VerifyError::UnsupportedVersion);
    }

    // 4. Algorithm.
    if challenge.alg != SIGNATURE_ALG {
        return Err(VerifyError::UnsupportedAlgorithm);
    }

    // 5. Expiry.
    let expires_at = challenge
        .expires_at()
        .map_err(|_| VerifyError::InvalidChallenge)?;
    if now >= expires_at {
        return Err(VerifyError::ChallengeExpired);
    }

    // 6. Audience.
    if challenge.aud != config.audience {
        return Err(VerifyError::AudienceMismatch);
    }

    // 7. Issuer.
    if challenge.server_id != config.issuer {
        return Err(VerifyError::ServerIdMismatch);
    }

    // 8. Client clock skew.
    let client_ts = parse_timestamp(&auth.ts).map_err(|_| VerifyError::InvalidRequest)?;
    let skew = (now - client_ts).num_seconds().unsigned_abs();
    if skew > u64::from(config.clock_skew_seconds) {
        return Err(VerifyError::TimestampSkew);
    }

    // 9. Method/path binding. When enabled the bind parameter is required,
    // must name the request being made, and the request must be the one the
    // challenge was issued for.
    if config.bind_method_path {
        let bind = auth.bind.as_deref().ok_or(VerifyError::BindingMismatch)?;
        let (bind_method, bind_path) =
            bind.split_once(':').ok_or(VerifyError::BindingMismatch)?;
        if bind_method != method || bind_path != path {
            return Err(VerifyError::BindingMismatch);
        }
        if challenge.method != method || challenge.path != path {
            return Err(VerifyError::BindingMismatch);
        }
    }

    // 10. Origin binding.
    if challenge.origin_bind {
        if let Some(headers) = headers {
            let origin = header(headers, "origin").or_else(|| header(headers, "referer"));
            match origin {
                Some(value) if origins_match(&challenge.aud, value) => {}
                _ => return Err(VerifyError::OriginMismatch),
            }
        }
    }

    // 11. User-agent binding.
    if challenge.ua_bind {
        if let Some(headers) = headers {
            let present = header(headers, "user-agent").is_some_and(|ua| !ua.trim().is_empty());
            if !present {
                return Err(VerifyError::UserAgentRequired);
            }
        }
    }

    // 12. Replay check. Consumption waits until the signature proves the
    // proof authentic, so a forged retry cannot burn the nonce.
    let replay_key = format!("{}:{}", auth.addr, challenge.nonce);
    let full_ttl = Duration::from_secs(u64::from(config.ttl_seconds));
    if let Some(store) = replay {
        if store.check(&replay_key, full_ttl) {
            return Err(VerifyError::ReplayDetected);
        }
    }

    // 13. Signature, over the signing string recomputed from the decoded
    // challenge. A key that is not 32 bytes or a signature that is not 64
    // bytes is rejected the same way as a failed verification.
    let address = WalletAddress::parse(&auth.addr).map_err(|_| VerifyError::InvalidSignature)?;
    let public_key =
        PublicKey::from_base58(&auth.addr).map_err(|_| VerifyError::InvalidSignature)?;
    let signature =
        Signature::from_base58(&auth.sig).map_err(|_| VerifyError::InvalidSignature)?;
    let message = challenge.signing_string();
    if !public_key.verify(message.as_bytes(), &signature) {
        return Err(VerifyError::InvalidSignature);
    }

    // Consume the nonce for the challenge's remaining lifetime. The atomic
    // check-and-store closes the race where two identical valid proofs
    // verify concurrently.
    if let Some(store) = replay {
        let remaining = u64::try_from((expires_at - now).num_seconds()).unwrap_or(0);
        if !store.check_and_store(&replay_key, Duration::from_secs(remaining)) {
            return Err(VerifyError::ReplayDetected);
        }
    }

    // 14. Token gate.
    if let Some(gate) = gate {
        match gate.allows(&address) {
            Ok(true) => {}
            Ok(false) => return Err(VerifyError::TokenGateFailed(None)),
            Err(e) => return Err(VerifyError::TokenGateFailed(Some(e.to_string()))),
        }
    }

    // 15. Authenticated.
    Ok(VerifiedRequest { address, challenge })
}
