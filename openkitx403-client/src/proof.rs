//! Proof construction.

use chrono::Utc;

use openkitx403_core::{
    encoding, parse_www_authenticate, AuthorizationParams, Challenge, RandomNonce,
};

use crate::error::ClientError;
use crate::wallet::WalletSigner;

/// Answer a challenge: parse the `WWW-Authenticate` value, sign the
/// derived signing string, and produce the `Authorization` header value
/// for the retry.
///
/// The challenge blob is echoed back exactly as received; the proof is
/// bound to the request being retried via `bind = "METHOD:PATH"`.
///
/// # Errors
///
/// Returns a [`ClientError`] if the header or its challenge payload is
/// malformed.
pub fn answer_challenge(
    www_authenticate: &str,
    wallet: &dyn WalletSigner,
    method: &str,
    path: &str,
) -> Result<String, ClientError> {
    let header = parse_www_authenticate(www_authenticate)?;
    let challenge = Challenge::decode(&header.challenge)?;
    let signature = wallet.sign_bytes(challenge.signing_string().as_bytes());

    Ok(AuthorizationParams {
        addr: wallet.address().to_string(),
        sig: signature.to_base58(),
        challenge: header.challenge,
        ts: encoding::format_timestamp(Utc::now()),
        nonce: RandomNonce::generate().into_string(),
        bind: Some(format!("{method}:{path}")),
    }
    .to_header_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::LocalWallet;
    use openkitx403_core::{Server, ServerConfig};

    #[test]
    fn test_answer_verifies_against_the_issuing_server() {
        let server = Server::new(ServerConfig::new("srv", "https://a.ex"));
        let wallet = LocalWallet::generate();

        let rejection = server.unauthenticated("GET", "/protected");
        let authorization =
            answer_challenge(&rejection.www_authenticate, &wallet, "GET", "/protected")
                .unwrap();

        let verified = server
            .verify(&authorization, "GET", "/protected", None)
            .unwrap();
        assert_eq!(verified.address, wallet.address());
    }

    #[test]
    fn test_answer_echoes_challenge_blob() {
        let server = Server::new(ServerConfig::new("srv", "https://a.ex"));
        let wallet = LocalWallet::generate();

        let rejection = server.unauthenticated("GET", "/protected");
        let issued = parse_www_authenticate(&rejection.www_authenticate).unwrap();
        let authorization =
            answer_challenge(&rejection.www_authenticate, &wallet, "GET", "/protected")
                .unwrap();

        let params = openkitx403_core::parse_authorization(&authorization).unwrap();
        assert_eq!(params.challenge, issued.challenge);
        assert_eq!(params.bind.as_deref(), Some("GET:/protected"));
    }

    #[test]
    fn test_rejects_foreign_scheme() {
        let wallet = LocalWallet::generate();
        let result = answer_challenge("Basic realm=\"x\"", &wallet, "GET", "/p");
        assert!(matches!(result, Err(ClientError::Header(_))));
    }
}
