//! Server configuration.

/// Default challenge lifetime in seconds. Deployments should keep this at
/// or below 300.
pub const DEFAULT_TTL_SECONDS: u32 = 60;

/// Default tolerance for client/server clock disagreement, in seconds.
pub const DEFAULT_CLOCK_SKEW_SECONDS: u32 = 120;

/// Per-server protocol parameters.
///
/// Built once at server construction and treated as immutable afterwards;
/// downstream code takes a read-only handle. The replay store and token
/// gate are owned by [`Server`](crate::Server), not by the config, so the
/// config stays a plain value type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Server identifier, used both as the `WWW-Authenticate` realm and as
    /// the challenge `serverId` claim.
    pub issuer: String,
    /// Expected audience origin (scheme + host + port).
    pub audience: String,
    /// Challenge lifetime in seconds.
    pub ttl_seconds: u32,
    /// Require proofs to be bound to the request method and path.
    pub bind_method_path: bool,
    /// Require the retry's `Origin` (or `Referer`) to match the audience.
    pub origin_binding: bool,
    /// Require the retry to carry a non-empty `User-Agent`.
    pub ua_binding: bool,
    /// Tolerance for client/server clock disagreement, in seconds.
    pub clock_skew_seconds: u32,
}

impl ServerConfig {
    /// Create a configuration with the given identity and the defaults:
    /// 60 second TTL, method/path binding on, origin and user-agent binding
    /// off, 120 second clock skew.
    #[must_use]
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            bind_method_path: true,
            origin_binding: false,
            ua_binding: false,
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
        }
    }
}
