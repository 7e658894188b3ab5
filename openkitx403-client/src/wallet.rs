//! Wallet capability.
//!
//! A wallet is discovery plus two capabilities: it has a public address,
//! and it can sign bytes. Concrete wallets (browser extensions, hardware
//! devices, remote signers) are separate adapters behind this trait; the
//! proof construction code never touches anything else.

use openkitx403_core::{Keypair, Signature, WalletAddress};

/// The signing capability a wallet must provide.
pub trait WalletSigner: Send + Sync {
    /// The wallet's base58 address.
    fn address(&self) -> WalletAddress;

    /// Sign an arbitrary byte string with the wallet key.
    fn sign_bytes(&self, message: &[u8]) -> Signature;
}

/// A wallet backed by an in-process keypair.
///
/// Suitable for tests, CLIs, and service-to-service callers that hold
/// their own key material.
pub struct LocalWallet {
    keypair: Keypair,
}

impl LocalWallet {
    /// Generate a wallet with a fresh random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// Wrap an existing keypair.
    #[must_use]
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

impl WalletSigner for LocalWallet {
    fn address(&self) -> WalletAddress {
        self.keypair.address()
    }

    fn sign_bytes(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }
}
