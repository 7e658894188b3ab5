//! The server handle.
//!
//! Owns the immutable configuration together with the two injected
//! capabilities (replay store, token gate) and exposes the three
//! operations a host adapter needs: issue a challenge, verify a proof,
//! shape a rejection.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::challenge::{Challenge, ChallengeBuilder};
use crate::config::ServerConfig;
use crate::gate::TokenGate;
use crate::replay::{LruReplayStore, ReplayStore};
use crate::response::{Rejection, WALLET_AUTH_REQUIRED, WALLET_AUTH_REQUIRED_DESCRIPTION};
use crate::verify::{verify_request, VerifiedRequest, VerifyError};

/// A configured protocol server.
///
/// Holds no per-request state; the replay store is the only shared
/// resource. Cheap to share behind an `Arc` across handler tasks.
pub struct Server {
    config: ServerConfig,
    replay: Option<Arc<dyn ReplayStore>>,
    gate: Option<Arc<dyn TokenGate>>,
}

impl Server {
    /// Create a server with the bounded in-memory replay store and no
    /// token gate.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            replay: Some(Arc::new(LruReplayStore::new())),
            gate: None,
        }
    }

    /// Substitute a replay store (a shared external store in multi-node
    /// deployments).
    #[must_use]
    pub fn with_replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replay = Some(store);
        self
    }

    /// Disable replay protection. Only sensible when an upstream layer
    /// already guarantees single use.
    #[must_use]
    pub fn without_replay_store(mut self) -> Self {
        self.replay = None;
        self
    }

    /// Install a token gate.
    #[must_use]
    pub fn with_token_gate(mut self, gate: Arc<dyn TokenGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// The server's configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Issue a fresh challenge for a request.
    #[must_use]
    pub fn challenge(
        &self,
        method: &str,
        path: &str,
        ext: Option<Map<String, Value>>,
    ) -> Challenge {
        ChallengeBuilder::new(&self.config).build(method, path, ext)
    }

    /// Verify a proof against the current clock.
    ///
    /// # Errors
    ///
    /// Returns the first failing check's [`VerifyError`].
    pub fn verify(
        &self,
        authorization: &str,
        method: &str,
        path: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<VerifiedRequest, VerifyError> {
        verify_request(
            &self.config,
            self.replay.as_deref(),
            self.gate.as_deref(),
            Utc::now(),
            authorization,
            method,
            path,
            headers,
        )
    }

    /// The 403 for a request that carried no proof.
    #[must_use]
    pub fn unauthenticated(&self, method: &str, path: &str) -> Rejection {
        Rejection::new(
            &self.challenge(method, path, None),
            WALLET_AUTH_REQUIRED,
            WALLET_AUTH_REQUIRED_DESCRIPTION,
        )
    }

    /// The 403 for a failed verification, with a fresh challenge for the
    /// current request's method and path.
    #[must_use]
    pub fn rejection(&self, error: &VerifyError, method: &str, path: &str) -> Rejection {
        Rejection::new(
            &self.challenge(method, path, None),
            error.code(),
            &error.description(),
        )
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("replay", &self.replay.is_some())
            .field("gate", &self.gate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_reflects_request() {
        let server = Server::new(ServerConfig::new("srv", "https://a.ex"));
        let challenge = server.challenge("POST", "/submit", None);
        assert_eq!(challenge.method, "POST");
        assert_eq!(challenge.path, "/submit");
        assert_eq!(challenge.server_id, "srv");
    }

    #[test]
    fn test_unauthenticated_shape() {
        let server = Server::new(ServerConfig::new("srv", "https://a.ex"));
        let rejection = server.unauthenticated("GET", "/r");
        assert!(rejection
            .www_authenticate
            .starts_with("OpenKitx403 realm=\"srv\""));
        let body: serde_json::Value = serde_json::from_str(&rejection.body).unwrap();
        assert_eq!(body["error"], "wallet_auth_required");
    }

    #[test]
    fn test_rejection_issues_fresh_challenge_for_current_request() {
        let server = Server::new(ServerConfig::new("srv", "https://a.ex"));
        let rejection =
            server.rejection(&VerifyError::ChallengeExpired, "PUT", "/other");
        let header = crate::authorization::parse_www_authenticate(&rejection.www_authenticate)
            .unwrap();
        let challenge = Challenge::decode(&header.challenge).unwrap();
        assert_eq!(challenge.method, "PUT");
        assert_eq!(challenge.path, "/other");
    }
}
