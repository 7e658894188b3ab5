//! axum middleware for OpenKitx403 wallet authentication.
//!
//! Wire [`require_wallet`] in front of protected routes with
//! `axum::middleware::from_fn_with_state`:
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Extension, Router};
//! use openkitx403_axum::{require_wallet, VerifiedWallet};
//! use openkitx403_core::{Server, ServerConfig};
//!
//! let server = Arc::new(Server::new(ServerConfig::new("api", "https://api.example")));
//!
//! let app: Router = Router::new()
//!     .route(
//!         "/protected",
//!         get(|Extension(wallet): Extension<VerifiedWallet>| async move {
//!             format!("hello {}", wallet.0)
//!         }),
//!     )
//!     .route_layer(middleware::from_fn_with_state(server, require_wallet));
//! ```
//!
//! Unauthenticated requests get a 403 with a fresh challenge; verified
//! requests reach the handler with [`VerifiedWallet`] in the extensions
//! and the response gains an `X-Authenticated-Address` header. Only 403
//! is ever emitted on the authentication path.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use openkitx403_core::{Rejection, Server, WalletAddress};

/// Response header naming the authenticated address.
pub const AUTHENTICATED_ADDRESS_HEADER: &str = "x-authenticated-address";

/// The authenticated wallet, inserted into request extensions on success.
#[derive(Debug, Clone)]
pub struct VerifiedWallet(pub WalletAddress);

/// Middleware requiring a wallet proof on every request it guards.
pub async fn require_wallet(
    State(server): State<Arc<Server>>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();

    let Some(authorization) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
    else {
        return deny(server.unauthenticated(&method, &path));
    };

    let binding_headers = binding_headers(request.headers());
    match server.verify(&authorization, &method, &path, Some(&binding_headers)) {
        Ok(verified) => {
            let address = verified.address.clone();
            request.extensions_mut().insert(VerifiedWallet(verified.address));

            let mut response = next.run(request).await;
            if let Ok(value) = HeaderValue::from_str(address.as_str()) {
                response
                    .headers_mut()
                    .insert(AUTHENTICATED_ADDRESS_HEADER, value);
            }
            response
        }
        Err(error) => {
            tracing::debug!("wallet proof rejected for {} {}: {}", method, path, error.code());
            deny(server.rejection(&error, &method, &path))
        }
    }
}

/// Collect the headers the verifier may bind against.
fn binding_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for name in ["origin", "referer", "user-agent"] {
        if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok()) {
            map.insert(name.to_string(), value.to_string());
        }
    }
    map
}

fn deny(rejection: Rejection) -> Response {
    let challenge = HeaderValue::from_str(&rejection.www_authenticate)
        .expect("challenge header value is always visible ASCII");

    let mut response = Response::new(Body::from(rejection.body));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
