//! Client error types.

use openkitx403_core::{EncodingError, ParseError};

/// Errors that can occur while answering a challenge or driving the HTTP
/// retry flow.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The `WWW-Authenticate` header could not be parsed.
    #[error("malformed challenge header: {0}")]
    Header(#[from] ParseError),

    /// The challenge blob could not be decoded.
    #[error("malformed challenge payload: {0}")]
    Challenge(#[from] EncodingError),

    /// The signed header value contains bytes HTTP cannot carry.
    #[error("proof is not a valid header value")]
    InvalidHeaderValue,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request body cannot be replayed for the signed retry.
    #[error("request body cannot be cloned for retry")]
    UnclonableRequest,
}
