use std::fmt;

use rpcauth_clock::{Clock, DurationSecs, System, UnixTime};

use super::{AccessToken, AccessTokenRef};

/// The default time a fetched token is trusted before it is fetched again
///
/// Deliberately shorter than the lifetime identity providers typically
/// advertise for these tokens.
pub const DEFAULT_TOKEN_TTL: DurationSecs = DurationSecs(5 * 60);

/// The scheme placed in front of a token in the `Authorization` header
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    /// `Bearer`
    #[default]
    Bearer,
    /// `Basic`
    Basic,
    /// `MAC`
    Mac,
    /// Any other scheme, used verbatim
    Other(String),
}

impl AuthScheme {
    /// Interprets an OAuth2 `token_type`
    ///
    /// Well-known types are matched case-insensitively. A missing or empty
    /// type means `Bearer`.
    pub fn from_token_type(token_type: Option<&str>) -> Self {
        match token_type {
            None | Some("") => Self::Bearer,
            Some(t) if t.eq_ignore_ascii_case("bearer") => Self::Bearer,
            Some(t) if t.eq_ignore_ascii_case("basic") => Self::Basic,
            Some(t) if t.eq_ignore_ascii_case("mac") => Self::Mac,
            Some(t) => Self::Other(t.to_owned()),
        }
    }

    /// The scheme as written in a header
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bearer => "Bearer",
            Self::Basic => "Basic",
            Self::Mac => "MAC",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token exactly as handed back by a token source, before it is timestamped
#[derive(Debug)]
pub struct IssuedToken {
    /// The access token
    pub access_token: AccessToken,
    /// The header scheme the authority asked for
    pub scheme: AuthScheme,
    /// The lifetime advertised by the authority, if any
    pub expires_in: Option<DurationSecs>,
}

impl IssuedToken {
    /// A bearer token with no advertised lifetime
    pub fn bearer(access_token: impl Into<AccessToken>) -> Self {
        Self {
            access_token: access_token.into(),
            scheme: AuthScheme::Bearer,
            expires_in: None,
        }
    }
}

/// An access token along with when it was fetched and when it stops being used
///
/// Values are never modified once created; a refresh produces a new value.
#[derive(Debug)]
pub struct TokenWithLifetime {
    access_token: AccessToken,
    scheme: AuthScheme,
    fetched_at: UnixTime,
    expiry: UnixTime,
}

impl TokenWithLifetime {
    /// Gets the current access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the scheme to use in the `Authorization` header
    #[inline]
    pub fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    /// Gets the time that the token was fetched
    #[inline]
    pub fn fetched_at(&self) -> UnixTime {
        self.fetched_at
    }

    /// Gets the time after which the token must be fetched again
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// Gets how long the token is used for
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.expiry - self.fetched_at
    }

    /// Whether the token is still usable at the provided time
    #[inline]
    pub fn is_valid_at(&self, time: UnixTime) -> bool {
        time < self.expiry
    }

    /// Whether the token is still usable according to the system clock
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(System.now())
    }

    /// Gets a duration for how much longer the token will be used as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        self.expiry - time
    }
}

/// Configuration for how long a fetched token is trusted
#[derive(Clone, Debug)]
pub struct TokenLifetimeConfig<C = System> {
    ttl: DurationSecs,
    clock: C,
}

impl Default for TokenLifetimeConfig {
    /// Uses [`DEFAULT_TOKEN_TTL`] and the system clock
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

impl TokenLifetimeConfig {
    /// Constructs a new lifetime configuration using the system clock
    pub fn new(ttl: DurationSecs) -> Self {
        Self { ttl, clock: System }
    }
}

impl<C> TokenLifetimeConfig<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenLifetimeConfig<D> {
        TokenLifetimeConfig {
            ttl: self.ttl,
            clock,
        }
    }

    /// The configured time-to-live
    #[inline]
    pub fn ttl(&self) -> DurationSecs {
        self.ttl
    }

    /// The clock used to timestamp and check tokens
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> TokenLifetimeConfig<C> {
    /// Timestamps a freshly issued token
    ///
    /// The token is used for the configured TTL, or for the authority's
    /// advertised lifetime if that is shorter.
    pub fn create_token(&self, issued: IssuedToken) -> TokenWithLifetime {
        let fetched_at = self.clock.now();
        let lifetime = issued
            .expires_in
            .map_or(self.ttl, |advertised| advertised.min(self.ttl));

        TokenWithLifetime {
            access_token: issued.access_token,
            scheme: issued.scheme,
            fetched_at,
            expiry: fetched_at + lifetime,
        }
    }
}

#[cfg(test)]
mod tests {
    use rpcauth_clock::TestClock;

    use super::*;

    fn config_at(now: u64) -> TokenLifetimeConfig<TestClock> {
        TokenLifetimeConfig::default().with_clock(TestClock::new(UnixTime(now)))
    }

    #[test]
    fn uses_default_ttl_without_advertised_lifetime() {
        let token = config_at(1_000).create_token(IssuedToken::bearer("abc"));

        assert_eq!(token.fetched_at(), UnixTime(1_000));
        assert_eq!(token.expiry(), UnixTime(1_300));
        assert_eq!(token.lifetime(), DEFAULT_TOKEN_TTL);
    }

    #[test]
    fn shorter_advertised_lifetime_wins() {
        let token = config_at(0).create_token(IssuedToken {
            expires_in: Some(DurationSecs(60)),
            ..IssuedToken::bearer("abc")
        });

        assert_eq!(token.lifetime(), DurationSecs(60));
    }

    #[test]
    fn longer_advertised_lifetime_is_capped_by_ttl() {
        let token = config_at(0).create_token(IssuedToken {
            expires_in: Some(DurationSecs(3_600)),
            ..IssuedToken::bearer("abc")
        });

        assert_eq!(token.lifetime(), DEFAULT_TOKEN_TTL);
    }

    #[test]
    fn token_is_invalid_from_expiry_onwards() {
        let token = config_at(100).create_token(IssuedToken::bearer("abc"));

        assert!(token.is_valid_at(UnixTime(399)));
        assert!(!token.is_valid_at(UnixTime(400)));
        assert_eq!(token.until_expired_at(UnixTime(350)), DurationSecs(50));
        assert_eq!(token.until_expired_at(UnixTime(500)), DurationSecs(0));
    }

    mod auth_scheme {
        use super::*;

        #[test]
        fn missing_token_type_is_bearer() {
            assert_eq!(AuthScheme::from_token_type(None), AuthScheme::Bearer);
            assert_eq!(AuthScheme::from_token_type(Some("")), AuthScheme::Bearer);
        }

        #[test]
        fn known_types_are_canonicalised() {
            assert_eq!(AuthScheme::from_token_type(Some("bearer")).as_str(), "Bearer");
            assert_eq!(AuthScheme::from_token_type(Some("BASIC")).as_str(), "Basic");
            assert_eq!(AuthScheme::from_token_type(Some("mac")).as_str(), "MAC");
        }

        #[test]
        fn unknown_types_are_kept_verbatim() {
            assert_eq!(
                AuthScheme::from_token_type(Some("DPoP")),
                AuthScheme::Other("DPoP".to_owned())
            );
        }
    }
}
