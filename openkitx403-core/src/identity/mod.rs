//! Wallet identity types.
//!
//! Ed25519 keypairs addressed Solana-style: the wallet address is the
//! base58 encoding of the 32-byte verifying key.
//!
//! - [`Keypair`] - signing key, zeroized on drop, no `Debug`
//! - [`PublicKey`] - verifying key for signature checks
//! - [`Signature`] - Ed25519 signature over a message
//! - [`WalletAddress`] - base58 address with constant-time equality
//!
//! # Security Properties
//!
//! - Private key material never appears in `Debug` output
//! - Address comparison uses constant-time equality
//! - `verify_strict` is used to reject weak/small-order keys

mod keys;

pub use keys::{Keypair, KeyError, PublicKey, Signature, WalletAddress};
