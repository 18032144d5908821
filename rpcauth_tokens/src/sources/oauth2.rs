//! Token sources that exchange credentials with an OAuth2-style token endpoint

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use super::AsyncTokenSource;
use crate::{
    AccessToken, AuthScheme, ClientIdRef, Credential, IssuedToken, TokenLifetimeConfig,
    TokenWithLifetime,
};
use rpcauth_clock::DurationSecs;

pub mod dto;

/// A credentials source for a token endpoint
pub trait CredentialsSource {
    /// The kind of exchange performed, for diagnostics
    fn grant_kind() -> &'static str;
    /// The client ID making the request, if the credential has one
    fn client_id(&self) -> Option<&ClientIdRef>;
    /// Attaches the credential to a token request
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, TokenRequestError>;
}

/// A token source for the client credentials exchange
///
/// Authenticates with `Authorization: Basic base64(client_id:client_secret)`.
#[derive(Debug)]
pub struct ClientCredentialsTokenSource {
    client: reqwest::Client,
    token_url: reqwest::Url,
    credentials: dto::ClientCredentials,
}

impl ClientCredentialsTokenSource {
    /// Constructs a new client credentials source
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        credentials: dto::ClientCredentials,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
        }
    }
}

#[async_trait]
impl AsyncTokenSource for ClientCredentialsTokenSource {
    type Error = TokenRequestError;

    async fn request_token(&self) -> Result<IssuedToken, Self::Error> {
        request_token(&self.client, self.token_url.clone(), &self.credentials).await
    }
}

/// A token source that exchanges a pre-encoded refresh token
///
/// Authenticates with `Authorization: Basic <refresh token>`.
#[derive(Debug)]
pub struct RefreshTokenSource {
    client: reqwest::Client,
    token_url: reqwest::Url,
    credentials: dto::RefreshTokenCredentials,
}

impl RefreshTokenSource {
    /// Constructs a new refresh token source
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        credentials: dto::RefreshTokenCredentials,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
        }
    }
}

#[async_trait]
impl AsyncTokenSource for RefreshTokenSource {
    type Error = TokenRequestError;

    async fn request_token(&self) -> Result<IssuedToken, Self::Error> {
        request_token(&self.client, self.token_url.clone(), &self.credentials).await
    }
}

/// An error while attempting to request a new token from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// The authority answered with something other than `200 OK`
    #[error("token request rejected by authority ({status}): {body}")]
    AuthRejected {
        /// The response status
        status: StatusCode,
        /// The body of the response, verbatim
        body: String,
    },
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    Decode(#[from] serde_json::Error),
    /// The token body did not contain a usable access token
    #[error("token body from authority contained an empty access token")]
    EmptyAccessToken,
    /// The credential cannot be carried in an `Authorization` header
    #[error("credential is not a valid authorization header value")]
    InvalidCredentials(#[source] reqwest::header::InvalidHeaderValue),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] reqwest::Error),
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    Transport(#[source] reqwest::Error),
}

fn maybe_value<'a, T: tracing::Value + 'a>(v: &'a Option<T>) -> &'a dyn tracing::Value {
    if let Some(v) = v {
        v
    } else {
        &tracing::field::Empty
    }
}

#[tracing::instrument(
    err,
    skip(client, token_url, credentials),
    fields(
        token_url = %token_url,
        credentials.grant_kind = R::grant_kind(),
        credentials.client_id = credentials.client_id().map(|c| c.as_str()),
    ),
)]
async fn request_token<R: CredentialsSource>(
    client: &reqwest::Client,
    token_url: reqwest::Url,
    credentials: &R,
) -> Result<IssuedToken, TokenRequestError> {
    tracing::trace!("requesting token from authority");

    let req = credentials
        .authorize(client.post(token_url))?
        .form(&dto::ClientCredentialsGrant::BODY);
    let resp = req.send().await.map_err(TokenRequestError::Transport)?;

    let status = resp.status();
    tracing::debug!(
        response.status = status.as_u16(),
        "received token response from issuing authority"
    );

    if status != StatusCode::OK {
        let body = resp
            .text()
            .await
            .map_err(TokenRequestError::BodyRead)?;
        return Err(TokenRequestError::AuthRejected { status, body });
    }

    let body = resp
        .bytes()
        .await
        .map_err(TokenRequestError::BodyRead)?;
    let resp: dto::TokenResponse = serde_json::from_slice(&body)?;

    if resp.access_token.is_empty() {
        return Err(TokenRequestError::EmptyAccessToken);
    }

    let token = IssuedToken {
        access_token: AccessToken::new(resp.access_token),
        scheme: AuthScheme::from_token_type(resp.token_type.as_deref()),
        expires_in: resp.expires_in.map(DurationSecs),
    };

    tracing::info!(
        scheme = %token.scheme,
        expires_in = maybe_value(&resp.expires_in),
        "received new access token"
    );

    Ok(token)
}

/// Performs a single, uncached token exchange for `credential`
///
/// An anonymous credential returns `Ok(None)` without any network I/O.
/// Otherwise exactly one request is sent to `token_url` and the resulting
/// token is timestamped with the default lifetime configuration.
pub async fn fetch_token(
    client: &reqwest::Client,
    token_url: &reqwest::Url,
    credential: &Credential,
) -> Result<Option<TokenWithLifetime>, TokenRequestError> {
    let issued = match credential {
        Credential::Anonymous => {
            tracing::trace!("no credential configured, skipping token exchange");
            return Ok(None);
        }
        Credential::ClientSecret {
            client_id,
            client_secret,
        } => {
            let credentials = dto::ClientCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            };
            request_token(client, token_url.clone(), &credentials).await?
        }
        Credential::RefreshToken(refresh_token) => {
            let credentials = dto::RefreshTokenCredentials {
                refresh_token: refresh_token.clone(),
            };
            request_token(client, token_url.clone(), &credentials).await?
        }
    };

    Ok(Some(TokenLifetimeConfig::default().create_token(issued)))
}
