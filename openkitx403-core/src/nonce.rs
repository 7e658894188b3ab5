//! Nonce generation.
//!
//! Both sides of the protocol use single-use random values: the server
//! embeds one in every challenge, the client sends one with every proof.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::encoding::encode_b64url;

/// Entropy per nonce. 128 bits, above the 96-bit floor the protocol requires.
const NONCE_BYTES: usize = 16;

/// A single-use random value, carried on the wire as base64url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomNonce(String);

impl RandomNonce {
    /// Generate a fresh nonce from the operating system CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(encode_b64url(&bytes))
    }

    /// Get the encoded nonce.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the nonce, returning its encoded form.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RandomNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_b64url;

    #[test]
    fn test_nonce_has_full_entropy_width() {
        let nonce = RandomNonce::generate();
        let bytes = decode_b64url(nonce.as_str()).unwrap();
        assert_eq!(bytes.len(), NONCE_BYTES);
    }

    #[test]
    fn test_nonces_are_unique() {
        let a = RandomNonce::generate();
        let b = RandomNonce::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_nonce_is_url_safe() {
        let nonce = RandomNonce::generate();
        assert!(!nonce.as_str().contains('='));
        assert!(!nonce.as_str().contains('+'));
        assert!(!nonce.as_str().contains('/'));
    }
}
