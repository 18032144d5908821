//! Authenticated HTTP clients for JSON-RPC endpoints
//!
//! [`ClientFactory`] assembles a pooled, gzip-negotiating [reqwest] client and
//! wraps it with [`AccessTokenMiddleware`] when a credential is supplied. The
//! resulting [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware)
//! is handed to whatever RPC client sits on top through [`FromHttpClient`].
//!
//! ```
//! use rpcauth_reqwest::ClientFactory;
//!
//! # fn main() -> Result<(), rpcauth_reqwest::BuildError> {
//! let rpc = ClientFactory::default()
//!     .build_from_encoded("https://rpc.example.com", "bXktY2xpZW50Om15LXNlY3JldA==")?;
//!
//! let req = rpc
//!     .post()
//!     .header("content-type", "application/json")
//!     .body(r#"{"jsonrpc":"2.0","id":1,"method":"getHealth"}"#);
//! # let _ = req;
//! # Ok(()) }
//! ```
//!
//! The middleware can also be installed by hand on any middleware stack:
//!
//! ```
//! use rpcauth_reqwest::AccessTokenMiddleware;
//! use rpcauth_tokens::{sources::ConstTokenSource, TokenCache};
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//!
//! let cache = TokenCache::new(ConstTokenSource::new("token"));
//!
//! let client = ClientBuilder::new(Client::default())
//!     .with(AccessTokenMiddleware::new(cache))
//!     .build();
//! # let _ = client;
//! ```
//!
//! If a request already has an `Authorization` header by the time the
//! middleware executes, the existing value is left in place and no token is
//! fetched, allowing overrides to be specified as required.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::fmt;

use bytes::{BufMut, BytesMut};
use reqwest::{header, Request, Response};
use reqwest_middleware::{Error, Middleware, Next, Result};
use rpcauth_clock::{Clock, System};
use rpcauth_tokens::{sources::AsyncTokenSource, TokenCache, TokenWithLifetime};

mod config;
mod factory;

pub use config::{ClientConfig, DEFAULT_TOKEN_URL};
pub use factory::{build, BuildError, ClientFactory, FromHttpClient, RpcEndpoint};

/// A middleware that injects an access token into outgoing requests
///
/// Tokens come from a [`TokenCache`], which fetches a new one when the cached
/// token is missing or has outlived its TTL. If that fetch fails, the request
/// is aborted with the fetch error and never reaches the inner transport.
pub struct AccessTokenMiddleware<S, C = System> {
    cache: TokenCache<S, C>,
}

impl<S, C> AccessTokenMiddleware<S, C> {
    /// Construct a new middleware from a token cache
    pub fn new(cache: TokenCache<S, C>) -> Self {
        Self { cache }
    }

    /// The cache backing this middleware
    pub fn cache(&self) -> &TokenCache<S, C> {
        &self.cache
    }
}

impl<S, C> Clone for AccessTokenMiddleware<S, C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<S: fmt::Debug, C: fmt::Debug> fmt::Debug for AccessTokenMiddleware<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenMiddleware")
            .field("cache", &self.cache)
            .finish()
    }
}

fn authorization_value(
    token: &TokenWithLifetime,
) -> std::result::Result<header::HeaderValue, header::InvalidHeaderValue> {
    let scheme = token.scheme().as_str();
    let access_token = token.access_token().as_str();

    let mut header_value = BytesMut::with_capacity(scheme.len() + 1 + access_token.len());
    header_value.put_slice(scheme.as_bytes());
    header_value.put_u8(b' ');
    header_value.put_slice(access_token.as_bytes());

    let mut value = header::HeaderValue::from_maybe_shared(header_value.freeze())?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait::async_trait]
impl<S, C> Middleware for AccessTokenMiddleware<S, C>
where
    S: AsyncTokenSource + 'static,
    C: Clock + Send + Sync + 'static,
{
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if req.headers().contains_key(header::AUTHORIZATION) {
            tracing::trace!("request already carries an authorization header");
            return next.run(req, extensions).await;
        }

        let token = self.cache.get_valid().await.map_err(Error::middleware)?;

        tracing::trace!(
            token.scheme = %token.scheme(),
            token.fetched_at = token.fetched_at().0,
            token.expiry = token.expiry().0,
            "attaching access token"
        );

        let value = authorization_value(&token).map_err(Error::middleware)?;
        req.headers_mut().insert(header::AUTHORIZATION, value);

        next.run(req, extensions).await
    }
}
