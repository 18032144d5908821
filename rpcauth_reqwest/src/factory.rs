//! Assembly of authenticated clients for RPC endpoints

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use rpcauth_tokens::{
    sources::{
        oauth2::{dto, ClientCredentialsTokenSource, RefreshTokenSource},
        AsyncTokenSource,
    },
    Credential, InvalidCredential, TokenCache, TokenLifetimeConfig,
};
use thiserror::Error;
use url::Url;

use crate::{AccessTokenMiddleware, ClientConfig};

/// An RPC client that can be driven by a preconfigured HTTP client
///
/// Implement this for an RPC client type to have a [`ClientFactory`] hand it
/// an authenticated client.
pub trait FromHttpClient {
    /// Constructs the RPC client for `endpoint`, sending through `client`
    fn from_http_client(endpoint: Url, client: ClientWithMiddleware) -> Self;
}

/// An RPC endpoint together with the HTTP client used to reach it
///
/// This performs no RPC framing of its own; it only points requests at the
/// endpoint.
#[derive(Clone, Debug)]
pub struct RpcEndpoint {
    endpoint: Url,
    client: ClientWithMiddleware,
}

impl RpcEndpoint {
    /// The endpoint URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The underlying HTTP client
    pub fn http_client(&self) -> &ClientWithMiddleware {
        &self.client
    }

    /// Starts a `POST` request to the endpoint
    pub fn post(&self) -> RequestBuilder {
        self.client.post(self.endpoint.clone())
    }
}

impl FromHttpClient for RpcEndpoint {
    fn from_http_client(endpoint: Url, client: ClientWithMiddleware) -> Self {
        Self { endpoint, client }
    }
}

/// An error while building a client
#[derive(Debug, Error)]
pub enum BuildError {
    /// The endpoint is not a valid URL
    #[error("invalid RPC endpoint")]
    InvalidEndpoint(#[from] url::ParseError),
    /// The credential could not be decoded
    #[error("invalid credential")]
    InvalidCredential(#[from] InvalidCredential),
    /// The HTTP client could not be constructed
    #[error("unable to construct HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Builds pooled, compressed HTTP clients with authentication installed
#[derive(Clone, Debug, Default)]
pub struct ClientFactory {
    config: ClientConfig,
}

impl ClientFactory {
    /// Constructs a new factory
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// The configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // HTTP/2 is negotiated through ALPN whenever the server offers it.
    fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .pool_max_idle_per_host(self.config.max_idle_per_host)
            .connect_timeout(self.config.connection_budget().into())
            .tcp_keepalive(Some(Duration::from(self.config.tcp_keepalive)))
            .gzip(self.config.gzip)
    }

    /// The transport that RPC requests are ultimately sent through
    pub fn inner_client(&self) -> Result<reqwest::Client, BuildError> {
        self.client_builder()
            .timeout(self.config.request_timeout.into())
            .build()
            .map_err(BuildError::Client)
    }

    /// The client used for token exchanges
    ///
    /// Exchanges share the request timeout. A fetch holds the token cache's
    /// lock until it completes, so it must always end.
    pub fn token_client(&self) -> Result<reqwest::Client, BuildError> {
        self.client_builder()
            .timeout(self.config.request_timeout.into())
            .build()
            .map_err(BuildError::Client)
    }

    /// Builds an [`RpcEndpoint`] for `endpoint`
    ///
    /// An anonymous credential yields a plain pass-through client. Any other
    /// credential installs an [`AccessTokenMiddleware`] driving the matching
    /// token exchange.
    pub fn build(&self, endpoint: &str, credential: Credential) -> Result<RpcEndpoint, BuildError> {
        self.build_with(endpoint, credential)
    }

    /// Builds an [`RpcEndpoint`] from a base64 `clientID:clientSecret` string
    ///
    /// An empty string disables authentication.
    pub fn build_from_encoded(
        &self,
        endpoint: &str,
        encoded_credential: &str,
    ) -> Result<RpcEndpoint, BuildError> {
        let credential = Credential::from_encoded_client_credentials(encoded_credential)?;
        self.build(endpoint, credential)
    }

    /// Builds any RPC client that accepts a preconfigured HTTP client
    #[tracing::instrument(
        err,
        skip(self, endpoint, credential),
        fields(endpoint = %endpoint, credential.grant_kind = credential.grant_kind()),
    )]
    pub fn build_with<R: FromHttpClient>(
        &self,
        endpoint: &str,
        credential: Credential,
    ) -> Result<R, BuildError> {
        let endpoint = Url::parse(endpoint)?;
        let builder = ClientBuilder::new(self.inner_client()?);

        let client = match credential {
            Credential::Anonymous => {
                tracing::debug!("no credential configured, requests pass through unchanged");
                builder.build()
            }
            Credential::ClientSecret {
                client_id,
                client_secret,
            } => {
                let source = ClientCredentialsTokenSource::new(
                    self.token_client()?,
                    self.config.token_url.clone(),
                    dto::ClientCredentials {
                        client_id,
                        client_secret,
                    },
                );
                builder.with(self.middleware(source)).build()
            }
            Credential::RefreshToken(refresh_token) => {
                let source = RefreshTokenSource::new(
                    self.token_client()?,
                    self.config.token_url.clone(),
                    dto::RefreshTokenCredentials { refresh_token },
                );
                builder.with(self.middleware(source)).build()
            }
        };

        tracing::debug!("built RPC client");
        Ok(R::from_http_client(endpoint, client))
    }

    fn middleware<S: AsyncTokenSource + 'static>(&self, source: S) -> AccessTokenMiddleware<S> {
        let lifetime_config = TokenLifetimeConfig::new(self.config.token_ttl);
        AccessTokenMiddleware::new(TokenCache::with_lifetime_config(source, lifetime_config))
    }
}

/// Builds an [`RpcEndpoint`] using the default [`ClientConfig`]
pub fn build(endpoint: &str, credential: Credential) -> Result<RpcEndpoint, BuildError> {
    ClientFactory::default().build(endpoint, credential)
}
