//! Client configuration

use rpcauth_clock::DurationSecs;
use rpcauth_tokens::DEFAULT_TOKEN_TTL;
use serde::Deserialize;
use url::Url;

/// The token endpoint used when none is configured
pub const DEFAULT_TOKEN_URL: &str =
    "https://auth.genesysgo.net/auth/realms/RPCs/protocol/openid-connect/token";

/// Settings for the HTTP clients assembled by a
/// [`ClientFactory`][crate::ClientFactory]
///
/// Every field has a default, so a configuration file only needs to name the
/// values it changes. Durations are whole seconds.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// The identity provider's token endpoint
    pub token_url: Url,
    /// Maximum idle connections kept per host (default 20)
    pub max_idle_per_host: usize,
    /// Time allowed to establish a TCP connection (default 5 minutes)
    pub connect_timeout: DurationSecs,
    /// TCP keep-alive interval (default 3 minutes)
    pub tcp_keepalive: DurationSecs,
    /// Time allowed for the TLS handshake (default 10 seconds)
    pub tls_handshake_timeout: DurationSecs,
    /// Overall timeout for each RPC request (default 5 minutes)
    ///
    /// Each token exchange is bounded by the same timeout, separately from
    /// the RPC request that triggered it.
    pub request_timeout: DurationSecs,
    /// How long a fetched access token is reused (default 5 minutes)
    pub token_ttl: DurationSecs,
    /// Whether to negotiate gzip response compression (default on)
    pub gzip: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("default token URL is valid"),
            max_idle_per_host: 20,
            connect_timeout: DurationSecs(5 * 60),
            tcp_keepalive: DurationSecs(3 * 60),
            tls_handshake_timeout: DurationSecs(10),
            request_timeout: DurationSecs(5 * 60),
            token_ttl: DEFAULT_TOKEN_TTL,
            gzip: true,
        }
    }
}

impl ClientConfig {
    /// Replaces the token endpoint
    pub fn with_token_url(mut self, token_url: Url) -> Self {
        self.token_url = token_url;
        self
    }

    /// Replaces the overall request timeout
    pub fn with_request_timeout(mut self, request_timeout: DurationSecs) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Replaces the token time-to-live
    pub fn with_token_ttl(mut self, token_ttl: DurationSecs) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    /// The bound applied to establishing a connection
    ///
    /// reqwest has a single connect timeout covering both the TCP dial and
    /// the TLS handshake, so the two budgets are added together.
    pub fn connection_budget(&self) -> DurationSecs {
        self.connect_timeout + self.tls_handshake_timeout
    }
}
