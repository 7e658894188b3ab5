//! HTTP retry client.
//!
//! Wraps `reqwest` with the protocol's challenge dance: send the request,
//! and if the server answers 403 with an `OpenKitx403` challenge, sign it
//! and retry once with the proof attached.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;

use openkitx403_core::SCHEME;

use crate::error::ClientError;
use crate::proof::answer_challenge;
use crate::wallet::WalletSigner;

/// An HTTP client that answers wallet challenges transparently.
pub struct AuthClient {
    http: reqwest::Client,
    wallet: Arc<dyn WalletSigner>,
}

impl AuthClient {
    /// Create a client with default `reqwest` settings.
    #[must_use]
    pub fn new(wallet: Arc<dyn WalletSigner>) -> Self {
        Self::with_client(reqwest::Client::new(), wallet)
    }

    /// Create a client over an existing `reqwest::Client` (connection
    /// pools, proxies, and TLS settings carry over).
    #[must_use]
    pub fn with_client(http: reqwest::Client, wallet: Arc<dyn WalletSigner>) -> Self {
        Self { http, wallet }
    }

    /// Convenience GET.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, ClientError> {
        self.execute(self.http.get(url)).await
    }

    /// Send a request, answering a wallet challenge if one comes back.
    ///
    /// Any response other than a 403 carrying an `OpenKitx403` challenge is
    /// returned as-is, including 403s from other authentication schemes.
    /// The retry happens at most once; if the retry is rejected again the
    /// second response is returned for the caller to inspect.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] for transport failures, malformed
    /// challenges, or a request whose body cannot be replayed.
    pub async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let request = request.build()?;
        let retry = request.try_clone();
        let response = self.http.execute(request).await?;

        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }
        let Some(challenge_header) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.starts_with(SCHEME))
            .map(str::to_owned)
        else {
            return Ok(response);
        };
        let Some(mut retry) = retry else {
            return Err(ClientError::UnclonableRequest);
        };

        let method = retry.method().as_str().to_owned();
        let path = retry.url().path().to_owned();
        tracing::debug!("wallet challenge received for {} {}, signing and retrying", method, path);

        let authorization =
            answer_challenge(&challenge_header, self.wallet.as_ref(), &method, &path)?;
        let value = HeaderValue::from_str(&authorization)
            .map_err(|_| ClientError::InvalidHeaderValue)?;
        retry.headers_mut().insert(AUTHORIZATION, value);

        self.http.execute(retry).await.map_err(Into::into)
    }
}
