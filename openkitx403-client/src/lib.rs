//! Client side of the OpenKitx403 protocol.
//!
//! Three pieces, layered so hosts can stop at whichever fits:
//!
//! - [`WalletSigner`] - the capability a wallet must provide (an address
//!   and the ability to sign bytes); [`LocalWallet`] backs it with an
//!   in-process keypair
//! - [`answer_challenge`] - pure proof construction from a
//!   `WWW-Authenticate` value
//! - [`AuthClient`] - a `reqwest` wrapper that answers 403 challenges and
//!   retries automatically

mod error;
mod http;
mod proof;
mod wallet;

pub use error::ClientError;
pub use http::AuthClient;
pub use proof::answer_challenge;
pub use wallet::{LocalWallet, WalletSigner};
