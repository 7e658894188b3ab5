//! Protocol engine for OpenKitx403 wallet authentication.
//!
//! OpenKitx403 is a stateless HTTP-native authentication protocol: a server
//! answers an unauthenticated request with HTTP 403 carrying a short-lived
//! challenge in `WWW-Authenticate`, the client signs a deterministic string
//! derived from that challenge with its Ed25519 wallet key, and the server
//! verifies the proof on the retry.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No logging
//! - No clock reads inside the verifier (the caller supplies `now`, or uses
//!   the [`Server`] handle which reads the clock at its boundary)
//!
//! External effects are injected via traits:
//! - [`ReplayStore`] - used-nonce tracking for replay prevention
//! - [`TokenGate`] - address-level authorization against external state
//!
//! # Example
//!
//! ```
//! use openkitx403_core::{Keypair, Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::new("api", "https://api.example"));
//!
//! // First request has no proof: issue a challenge.
//! let challenge = server.challenge("GET", "/protected", None);
//! let header = challenge.header_value();
//! assert!(header.starts_with("OpenKitx403 realm=\"api\""));
//! ```

pub mod authorization;
pub mod challenge;
pub mod config;
pub mod encoding;
pub mod gate;
pub mod identity;
pub mod nonce;
pub mod replay;
pub mod response;
pub mod server;
pub mod verify;

pub use authorization::{parse_authorization, parse_www_authenticate, AuthorizationParams, ChallengeHeader, ParseError};
pub use challenge::{Challenge, ChallengeBuilder, PROTOCOL_VERSION, SCHEME, SIGNATURE_ALG};
pub use config::ServerConfig;
pub use encoding::EncodingError;
pub use gate::{GateError, TokenGate};
pub use identity::{Keypair, KeyError, PublicKey, Signature, WalletAddress};
pub use nonce::RandomNonce;
pub use replay::{LruReplayStore, ReplayStore};
pub use response::Rejection;
pub use server::Server;
pub use verify::{verify_request, VerifiedRequest, VerifyError};
