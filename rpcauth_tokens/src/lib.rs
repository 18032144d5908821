//! Credential exchange and access token caching for authenticated RPC clients
//!
//! A [`Credential`] describes how to get an access token. A token source in
//! [`sources`] performs the exchange with the identity provider, and a
//! [`TokenCache`] keeps the resulting token around until its time-to-live runs
//! out. The cache serializes refreshes: however many requests discover an
//! expired token at once, only one exchange is sent to the token endpoint.
//!
//! Two exchanges are supported, both posting `grant_type=client_credentials`
//! as a form to the token endpoint:
//!
//! * _client credentials_, authenticating with
//!   `Authorization: Basic base64(client_id:client_secret)`
//! * _refresh token_, authenticating with `Authorization: Basic <refresh token>`
//!
//! ```
//! use rpcauth_tokens::{sources, Credential, TokenCache};
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let credential = Credential::from_encoded_client_credentials("bXktY2xpZW50Om15LXNlY3JldA==")?;
//!
//! let source = match credential {
//!     Credential::ClientSecret { client_id, client_secret } => {
//!         sources::oauth2::ClientCredentialsTokenSource::new(
//!             reqwest::Client::new(),
//!             reqwest::Url::parse("https://auth.example.com/token")?,
//!             sources::oauth2::dto::ClientCredentials { client_id, client_secret },
//!         )
//!     }
//!     _ => unreachable!(),
//! };
//!
//! let cache = TokenCache::new(source);
//! # let _ = cache;
//! # /* Commented out due to this trying to interact with the world.
//! let token = cache.get_valid().await?;
//! tracing::info!(token = format_args!("{:#?}", token.access_token()), "access token");
//! # */
//! # Ok(()) }
//! ```
//!
//! # Features
//!
//! * `oauth2` (default): token sources that talk to an HTTP token endpoint
//!   using [reqwest].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod cache;
mod credential;
pub mod sources;
mod tokens;

pub use braids::*;
pub use cache::{TokenCache, TokenCacheError};
pub use credential::{Credential, InvalidCredential};
pub use tokens::{AuthScheme, IssuedToken, TokenLifetimeConfig, TokenWithLifetime, DEFAULT_TOKEN_TTL};
