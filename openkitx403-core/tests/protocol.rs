//! End-to-end protocol tests: a client producing proofs exactly as the
//! wire format requires, a server verifying them, and the failure
//! semantics when any single precondition is broken.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use openkitx403_core::{
    encoding, verify_request, AuthorizationParams, Challenge, ChallengeBuilder, Keypair,
    LruReplayStore, RandomNonce, ReplayStore, Server, ServerConfig, VerifyError,
    PROTOCOL_VERSION, SIGNATURE_ALG,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn config() -> ServerConfig {
    ServerConfig::new("srv", "https://a.ex")
}

/// Produce the proof a conforming client would send for this challenge.
fn sign_challenge(challenge: &Challenge, keypair: &Keypair, client_now: DateTime<Utc>) -> String {
    let signature = keypair.sign(challenge.signing_string().as_bytes());
    AuthorizationParams {
        addr: keypair.address().to_string(),
        sig: signature.to_base58(),
        challenge: challenge.encode(),
        ts: encoding::format_timestamp(client_now),
        nonce: RandomNonce::generate().into_string(),
        bind: Some(format!("{}:{}", challenge.method, challenge.path)),
    }
    .to_header_value()
}

fn verify(
    config: &ServerConfig,
    store: Option<&LruReplayStore>,
    header: &str,
) -> Result<openkitx403_core::VerifiedRequest, VerifyError> {
    verify_request(
        config,
        store.map(|s| s as &dyn ReplayStore),
        None,
        now(),
        header,
        "GET",
        "/protected",
        None,
    )
}

#[test]
fn happy_path_get_with_binding() {
    let config = config();
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    let header = sign_challenge(&challenge, &keypair, now());

    let verified = verify(&config, None, &header).unwrap();
    assert_eq!(verified.address, keypair.address());
    assert_eq!(verified.challenge.nonce, challenge.nonce);
}

#[test]
fn expired_challenge() {
    let config = config();
    let keypair = Keypair::generate();
    // TTL is 60s; issuing 61s ago puts the expiry one second in the past.
    let issued = now() - chrono::Duration::seconds(61);
    let challenge = ChallengeBuilder::new(&config).build_at(issued, "GET", "/protected", None);
    let header = sign_challenge(&challenge, &keypair, now());

    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::ChallengeExpired)
    );
}

#[test]
fn wrong_audience() {
    let config = config();
    let keypair = Keypair::generate();
    let mut foreign = config.clone();
    foreign.audience = "https://evil.ex".to_string();
    let challenge = ChallengeBuilder::new(&foreign).build_at(now(), "GET", "/protected", None);
    let header = sign_challenge(&challenge, &keypair, now());

    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::AudienceMismatch)
    );
}

#[test]
fn clock_skew() {
    let config = config();
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    // Client clock runs 300s ahead; the window is 120s.
    let header = sign_challenge(&challenge, &keypair, now() + chrono::Duration::seconds(300));

    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::TimestampSkew)
    );
}

#[test]
fn replay_within_ttl() {
    let config = config();
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    let header = sign_challenge(&challenge, &keypair, now());
    let store = LruReplayStore::new();

    assert!(verify(&config, Some(&store), &header).is_ok());
    assert_eq!(
        verify(&config, Some(&store), &header),
        Err(VerifyError::ReplayDetected)
    );
}

#[test]
fn replay_outside_ttl_reports_expiry_first() {
    let config = config();
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    let header = sign_challenge(&challenge, &keypair, now());
    let store = LruReplayStore::new();

    assert!(verify(&config, Some(&store), &header).is_ok());

    // Resubmitting after the challenge lapses fails on expiry, before the
    // replay check is ever reached.
    let late = now() + chrono::Duration::seconds(120);
    let result = verify_request(
        &config,
        Some(&store),
        None,
        late,
        &header,
        "GET",
        "/protected",
        None,
    );
    assert_eq!(result, Err(VerifyError::ChallengeExpired));
}

#[test]
fn tampered_signature_leaves_store_clean() {
    let config = config();
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    let header = sign_challenge(&challenge, &keypair, now());
    let store = LruReplayStore::new();

    // Flip one character of the base58 signature.
    let header = {
        let mut params = openkitx403_core::parse_authorization(&header).unwrap();
        let mut sig = params.sig.into_bytes();
        sig[0] = if sig[0] == b'2' { b'3' } else { b'2' };
        params.sig = String::from_utf8(sig).unwrap();
        params.to_header_value()
    };

    assert_eq!(
        verify(&config, Some(&store), &header),
        Err(VerifyError::InvalidSignature)
    );
    assert!(
        !store.check(
            &format!("{}:{}", keypair.address(), challenge.nonce),
            Duration::from_secs(60)
        ),
        "a failed signature must not consume the nonce"
    );
}

#[test]
fn origin_binding_violation() {
    let mut config = config();
    config.origin_binding = true;
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    assert!(challenge.origin_bind);
    let header = sign_challenge(&challenge, &keypair, now());

    let mut headers = HashMap::new();
    headers.insert("Origin".to_string(), "https://other.ex".to_string());

    let result = verify_request(
        &config,
        None,
        None,
        now(),
        &header,
        "GET",
        "/protected",
        Some(&headers),
    );
    assert_eq!(result, Err(VerifyError::OriginMismatch));
}

// First-failure ordering: each case satisfies every check before the one
// it breaks, and breaks at least one later check as well.

fn craft(mutate: impl FnOnce(&mut Challenge)) -> (ServerConfig, String) {
    let config = config();
    let keypair = Keypair::generate();
    let mut challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    mutate(&mut challenge);
    let header = sign_challenge(&challenge, &keypair, now());
    (config, header)
}

#[test]
fn ordering_version_before_algorithm() {
    let (config, header) = craft(|c| {
        c.v = 2;
        c.alg = "rsa-pss".to_string();
    });
    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::UnsupportedVersion)
    );
}

#[test]
fn ordering_algorithm_before_expiry() {
    let (config, header) = craft(|c| {
        c.alg = "ed25519".to_string();
        c.exp = "2020-01-01T00:00:00Z".to_string();
    });
    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::UnsupportedAlgorithm)
    );
}

#[test]
fn ordering_expiry_before_audience() {
    let (config, header) = craft(|c| {
        c.exp = "2020-01-01T00:00:00Z".to_string();
        c.aud = "https://evil.ex".to_string();
    });
    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::ChallengeExpired)
    );
}

#[test]
fn ordering_audience_before_server_id() {
    let (config, header) = craft(|c| {
        c.aud = "https://evil.ex".to_string();
        c.server_id = "other".to_string();
    });
    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::AudienceMismatch)
    );
}

#[test]
fn ordering_skew_before_binding() {
    let config = config();
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    // Stale client clock and a missing bind parameter: skew wins.
    let signature = keypair.sign(challenge.signing_string().as_bytes());
    let header = AuthorizationParams {
        addr: keypair.address().to_string(),
        sig: signature.to_base58(),
        challenge: challenge.encode(),
        ts: encoding::format_timestamp(now() - chrono::Duration::seconds(600)),
        nonce: RandomNonce::generate().into_string(),
        bind: None,
    }
    .to_header_value();

    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::TimestampSkew)
    );
}

#[test]
fn ordering_binding_before_signature() {
    let config = config();
    let keypair = Keypair::generate();
    let challenge = ChallengeBuilder::new(&config).build_at(now(), "GET", "/protected", None);
    let signature = keypair.sign(b"the wrong message entirely");
    let header = AuthorizationParams {
        addr: keypair.address().to_string(),
        sig: signature.to_base58(),
        challenge: challenge.encode(),
        ts: encoding::format_timestamp(now()),
        nonce: RandomNonce::generate().into_string(),
        bind: Some("POST:/elsewhere".to_string()),
    }
    .to_header_value();

    assert_eq!(
        verify(&config, None, &header),
        Err(VerifyError::BindingMismatch)
    );
}

#[test]
fn server_handle_end_to_end() {
    let server = Server::new(config());
    let keypair = Keypair::generate();

    // 403 flow: take the challenge from the rejection header, sign, retry.
    let rejection = server.unauthenticated("GET", "/protected");
    let parsed = openkitx403_core::parse_www_authenticate(&rejection.www_authenticate).unwrap();
    assert_eq!(parsed.realm, "srv");
    let challenge = Challenge::decode(&parsed.challenge).unwrap();
    assert_eq!(challenge.v, PROTOCOL_VERSION);
    assert_eq!(challenge.alg, SIGNATURE_ALG);

    let header = sign_challenge(&challenge, &keypair, Utc::now());
    let verified = server
        .verify(&header, "GET", "/protected", None)
        .expect("freshly signed challenge should verify");
    assert_eq!(verified.address, keypair.address());

    // Same proof again: consumed.
    assert_eq!(
        server.verify(&header, "GET", "/protected", None),
        Err(VerifyError::ReplayDetected)
    );
}
