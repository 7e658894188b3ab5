//! Address-level authorization.

use crate::identity::WalletAddress;

/// Failure reported by a token gate.
///
/// Carries the gate's own description of what went wrong (an RPC failure,
/// a timeout imposed by the host); the verifier surfaces it in the
/// rejection description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct GateError(String);

impl GateError {
    /// Create a gate error with the given description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A predicate over a wallet address, gating access on external state
/// (on-chain holdings, an allowlist service).
///
/// Invoked only after the proof's signature has been verified, so gates
/// never see unauthenticated addresses.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` for concurrent verification.
pub trait TokenGate: Send + Sync {
    /// Decide whether the address is allowed.
    ///
    /// # Errors
    ///
    /// Returns a [`GateError`] when the decision itself could not be made;
    /// the verification is rejected either way.
    fn allows(&self, address: &WalletAddress) -> Result<bool, GateError>;
}

impl<F> TokenGate for F
where
    F: Fn(&WalletAddress) -> Result<bool, GateError> + Send + Sync,
{
    fn allows(&self, address: &WalletAddress) -> Result<bool, GateError> {
        self(address)
    }
}
