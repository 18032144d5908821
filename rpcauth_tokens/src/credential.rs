//! Credentials used to obtain access tokens

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::{ClientId, ClientSecret, RefreshToken};

/// Secret material used to obtain an access token
///
/// A credential is supplied once, when a client is built, and never changes
/// afterwards. [`Credential::Anonymous`] means that no authentication is
/// configured: nothing is fetched and no `Authorization` header is attached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Credential {
    /// No authentication
    #[default]
    Anonymous,
    /// A client ID and secret for the client credentials exchange
    ClientSecret {
        /// The client ID
        client_id: ClientId,
        /// The client secret
        client_secret: ClientSecret,
    },
    /// An opaque, pre-encoded refresh token
    RefreshToken(RefreshToken),
}

/// The credential string could not be decoded
#[derive(Debug, Error)]
pub enum InvalidCredential {
    /// The credential is not valid standard base64
    #[error("credential is not valid base64")]
    Base64(#[from] base64::DecodeError),
    /// The decoded credential is not valid UTF-8
    #[error("decoded credential is not valid UTF-8")]
    NotUtf8(#[from] std::string::FromUtf8Error),
    /// The decoded credential has no `:` between client ID and secret
    #[error("decoded credential is missing the `:` separator")]
    MissingSeparator,
}

impl Credential {
    /// Decodes a base64 `clientID:clientSecret` pair
    ///
    /// An empty string yields [`Credential::Anonymous`]. The decoded value is
    /// split on the first `:` only, so secrets may themselves contain colons.
    pub fn from_encoded_client_credentials(encoded: &str) -> Result<Self, InvalidCredential> {
        if encoded.is_empty() {
            return Ok(Self::Anonymous);
        }

        let decoded = String::from_utf8(STANDARD.decode(encoded)?)?;
        let (client_id, client_secret) = decoded
            .split_once(':')
            .ok_or(InvalidCredential::MissingSeparator)?;

        Ok(Self::ClientSecret {
            client_id: ClientId::from(client_id),
            client_secret: ClientSecret::from(client_secret),
        })
    }

    /// Wraps an opaque refresh token
    ///
    /// An empty string yields [`Credential::Anonymous`].
    pub fn from_refresh_token(token: &str) -> Self {
        if token.is_empty() {
            Self::Anonymous
        } else {
            Self::RefreshToken(RefreshToken::from(token))
        }
    }

    /// Whether this credential disables authentication entirely
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// A short, non-secret label for the exchange this credential drives
    pub fn grant_kind(&self) -> &'static str {
        match self {
            Self::Anonymous => "none",
            Self::ClientSecret { .. } => "client_credentials",
            Self::RefreshToken(_) => "refresh_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod decoding_client_credentials {
        use super::*;

        #[test]
        fn empty_input_disables_authentication() {
            let cred = Credential::from_encoded_client_credentials("").unwrap();
            assert!(cred.is_anonymous());
        }

        #[test]
        fn splits_id_and_secret() {
            let encoded = STANDARD.encode("my-client:my-secret");
            let cred = Credential::from_encoded_client_credentials(&encoded).unwrap();

            match cred {
                Credential::ClientSecret {
                    client_id,
                    client_secret,
                } => {
                    assert_eq!(client_id.as_str(), "my-client");
                    assert_eq!(client_secret.as_str(), "my-secret");
                }
                other => panic!("unexpected credential: {:?}", other),
            }
        }

        #[test]
        fn splits_only_once() {
            let encoded = STANDARD.encode("id:secret:with:colons");
            let cred = Credential::from_encoded_client_credentials(&encoded).unwrap();

            assert!(matches!(
                cred,
                Credential::ClientSecret { ref client_secret, .. }
                    if client_secret.as_str() == "secret:with:colons"
            ));
        }

        #[test]
        fn rejects_malformed_base64() {
            let err = Credential::from_encoded_client_credentials("not-base64!!").unwrap_err();
            assert!(matches!(err, InvalidCredential::Base64(_)));
        }

        #[test]
        fn rejects_missing_separator() {
            let encoded = STANDARD.encode("no-separator-here");
            let err = Credential::from_encoded_client_credentials(&encoded).unwrap_err();
            assert!(matches!(err, InvalidCredential::MissingSeparator));
        }

        #[test]
        fn rejects_non_utf8_payload() {
            let encoded = STANDARD.encode([0xff, 0xfe, b':', b'x']);
            let err = Credential::from_encoded_client_credentials(&encoded).unwrap_err();
            assert!(matches!(err, InvalidCredential::NotUtf8(_)));
        }
    }

    #[test]
    fn empty_refresh_token_disables_authentication() {
        assert!(Credential::from_refresh_token("").is_anonymous());
        assert_eq!(
            Credential::from_refresh_token("abc").grant_kind(),
            "refresh_token"
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cred = Credential::ClientSecret {
            client_id: ClientId::from_static("visible-id"),
            client_secret: ClientSecret::from_static("hidden-secret"),
        };
        let printed = format!("{:?}", cred);
        assert!(printed.contains("visible-id"));
        assert!(!printed.contains("hidden-secret"));
    }
}
