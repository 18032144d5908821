//! Token sources

use std::{convert::Infallible, error};

use async_trait::async_trait;

use crate::{AccessToken, IssuedToken};

#[cfg(feature = "oauth2")]
pub mod oauth2;

/// An asynchronous source for tokens
///
/// Each call performs a fresh exchange; sources never cache. Caching and
/// refresh serialization belong to [`TokenCache`][crate::TokenCache].
#[async_trait]
pub trait AsyncTokenSource: Send + Sync {
    /// The error type returned in the event that retrieving a token fails
    type Error: error::Error + Send + Sync + 'static;

    /// Requests a token from an asynchronous source
    async fn request_token(&self) -> Result<IssuedToken, Self::Error>;
}

/// A token source that always hands out the same bearer token
#[derive(Clone, Debug)]
pub struct ConstTokenSource {
    token: AccessToken,
}

impl ConstTokenSource {
    /// Constructs a new constant token source
    pub fn new(token: impl Into<AccessToken>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AsyncTokenSource for ConstTokenSource {
    type Error = Infallible;

    async fn request_token(&self) -> Result<IssuedToken, Self::Error> {
        Ok(IssuedToken::bearer(self.token.clone()))
    }
}
