//! DTOs for interacting with OAuth2 token endpoints

use serde::{Deserialize, Serialize};

use super::TokenRequestError;
use crate::{ClientId, ClientIdRef, ClientSecret, RefreshToken};

/// Client credentials
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,
}

impl super::CredentialsSource for ClientCredentials {
    fn grant_kind() -> &'static str {
        "client_credentials"
    }

    fn client_id(&self) -> Option<&ClientIdRef> {
        Some(&self.client_id)
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, TokenRequestError> {
        Ok(request.basic_auth(
            self.client_id.as_str(),
            Some(self.client_secret.as_str()),
        ))
    }
}

/// Refresh token credentials
///
/// The token is sent verbatim as the `Basic` credential.
#[derive(Clone, Debug)]
pub struct RefreshTokenCredentials {
    /// The refresh token
    pub refresh_token: RefreshToken,
}

impl super::CredentialsSource for RefreshTokenCredentials {
    fn grant_kind() -> &'static str {
        "refresh_token"
    }

    fn client_id(&self) -> Option<&ClientIdRef> {
        None
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, TokenRequestError> {
        use reqwest::header::{HeaderValue, AUTHORIZATION};

        let mut value = HeaderValue::try_from(format!("Basic {}", self.refresh_token.as_str()))
            .map_err(TokenRequestError::InvalidCredentials)?;
        value.set_sensitive(true);
        Ok(request.header(AUTHORIZATION, value))
    }
}

/// The form body sent to the token endpoint
///
/// Both supported exchanges post `grant_type=client_credentials` and differ
/// only in how they authenticate.
#[derive(Debug, Serialize)]
pub(super) struct ClientCredentialsGrant {
    pub grant_type: &'static str,
}

impl ClientCredentialsGrant {
    pub const BODY: Self = Self {
        grant_type: "client_credentials",
    };
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
