//! Ed25519 keys and base58 wallet addresses.

use ed25519_dalek::Signer;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Errors that can occur during key operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum KeyError {
    /// The provided bytes have an invalid length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The provided bytes do not represent a valid key.
    #[error("invalid key format")]
    InvalidFormat,

    /// The string is not valid base58.
    #[error("invalid base58 encoding")]
    InvalidBase58,
}

/// A private Ed25519 signing key.
///
/// # Security
///
/// - Key material is zeroized when the value is dropped
/// - No `Debug` implementation to prevent accidental logging
pub struct Keypair(ed25519_dalek::SigningKey);

impl Keypair {
    /// Generate a new random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Load a keypair from raw secret key bytes.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidLength` if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(ed25519_dalek::SigningKey::from_bytes(&bytes)))
    }

    /// Sign a message with this keypair.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    /// Derive the public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Derive the base58 wallet address.
    #[must_use]
    pub fn address(&self) -> WalletAddress {
        self.public_key().address()
    }

    /// Export the raw secret key bytes.
    ///
    /// # Security
    ///
    /// Handle with extreme care. Consider zeroizing the returned array
    /// after use if storing or transmitting.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

// Explicitly NO Debug implementation for Keypair

/// A public Ed25519 verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl PublicKey {
    /// Load a public key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidLength` if the slice is not exactly 32 bytes.
    /// Returns `KeyError::InvalidFormat` if the bytes don't represent a valid point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidFormat)?;
        Ok(Self(key))
    }

    /// Decode a public key from a base58 wallet address string.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidBase58` if the string is not base58, and
    /// `KeyError::InvalidLength` if it decodes to anything but 32 bytes.
    pub fn from_base58(address: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(address)
            .into_vec()
            .map_err(|_| KeyError::InvalidBase58)?;
        Self::from_bytes(&bytes)
    }

    /// Export the raw public key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// The base58 wallet address of this key.
    #[must_use]
    pub fn address(&self) -> WalletAddress {
        WalletAddress(bs58::encode(self.0.to_bytes()).into_string())
    }

    /// Verify a signature over a message.
    ///
    /// Uses `verify_strict` to reject weak/small-order keys.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify_strict(message, &signature.0).is_ok()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.address())
    }
}

/// An Ed25519 signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Load a signature from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidLength` if the slice is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: 64,
            actual: bytes.len(),
        })?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&bytes)))
    }

    /// Decode a signature from its base58 wire form.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidBase58` if the string is not base58, and
    /// `KeyError::InvalidLength` if it decodes to anything but 64 bytes.
    pub fn from_base58(encoded: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| KeyError::InvalidBase58)?;
        Self::from_bytes(&bytes)
    }

    /// Encode the signature as base58 for the wire.
    #[must_use]
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0.to_bytes()).into_string()
    }

    /// Export the raw signature bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show only the first bytes of the signature for debugging
        let bytes = self.0.to_bytes();
        write!(
            f,
            "Signature({:02x}{:02x}{:02x}{:02x}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

/// A base58-encoded wallet address (32-byte Ed25519 public key).
///
/// # Security
///
/// Comparisons use constant-time equality to prevent timing attacks.
/// The Hash derive is intentionally kept despite manual PartialEq because
/// the address string itself is public information; only equality
/// comparisons need timing-attack protection.
#[derive(Clone, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::derived_hash_with_manual_eq)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse an address string, validating that it decodes to a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidBase58` for non-base58 input and
    /// `KeyError::InvalidLength` for keys of the wrong size.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| KeyError::InvalidBase58)?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Get the address as a string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for WalletAddress {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison to prevent timing attacks
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletAddress({})", self.0)
    }
}
