//! A single-entry access token cache with serialized refresh

use std::{fmt, sync::Arc};

use rpcauth_clock::{Clock, System};
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinError};
use tracing::Instrument;

use crate::{sources::AsyncTokenSource, TokenLifetimeConfig, TokenWithLifetime};

type Entry = Option<Arc<TokenWithLifetime>>;

/// Caches at most one access token and refreshes it on demand
///
/// All access to the cached entry goes through one mutex. A caller that finds
/// the entry missing or expired performs the fetch while the lock is held, so
/// callers arriving in the meantime wait for that fetch and then reuse its
/// result instead of starting their own.
///
/// The fetch itself runs on a spawned task that owns the lock. Dropping the
/// caller that started it does not abort it; the token still lands in the
/// cache for whoever is waiting.
///
/// Failed fetches leave the entry untouched, so the next call tries again.
/// There is no backoff and no background refresh.
pub struct TokenCache<S, C = System> {
    source: Arc<S>,
    lifetime_config: Arc<TokenLifetimeConfig<C>>,
    entry: Arc<Mutex<Entry>>,
}

impl<S> TokenCache<S, System> {
    /// Constructs a new cache using the default lifetime configuration
    pub fn new(source: S) -> Self {
        Self::with_lifetime_config(source, TokenLifetimeConfig::default())
    }
}

impl<S, C> TokenCache<S, C> {
    /// Constructs a new cache with a custom lifetime configuration
    pub fn with_lifetime_config(source: S, lifetime_config: TokenLifetimeConfig<C>) -> Self {
        Self {
            source: Arc::new(source),
            lifetime_config: Arc::new(lifetime_config),
            entry: Arc::new(Mutex::new(None)),
        }
    }

    /// The currently cached token, whether or not it is still valid
    pub async fn cached(&self) -> Option<Arc<TokenWithLifetime>> {
        self.entry.lock().await.clone()
    }

    /// Discards the cached token so that the next request fetches a new one
    pub async fn invalidate(&self) {
        self.entry.lock().await.take();
    }
}

impl<S, C> TokenCache<S, C>
where
    S: AsyncTokenSource + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Returns a valid access token, fetching one if needed
    pub async fn get_valid(&self) -> Result<Arc<TokenWithLifetime>, TokenCacheError<S::Error>> {
        let mut entry = Arc::clone(&self.entry).lock_owned().await;

        let now = self.lifetime_config.clock().now();
        if let Some(token) = (*entry).as_ref().filter(|t| t.is_valid_at(now)) {
            tracing::trace!(
                token.fetched_at = token.fetched_at().0,
                token.until_expired = token.until_expired_at(now).0,
                "using cached access token"
            );
            return Ok(Arc::clone(token));
        }

        tracing::debug!(
            token.present = entry.is_some(),
            "cached access token missing or expired, fetching"
        );

        let source = Arc::clone(&self.source);
        let lifetime_config = Arc::clone(&self.lifetime_config);
        let refresh = tokio::spawn(
            async move {
                let issued = source
                    .request_token()
                    .await
                    .map_err(TokenCacheError::Source)?;
                let token = Arc::new(lifetime_config.create_token(issued));
                *entry = Some(Arc::clone(&token));

                tracing::debug!(
                    token.fetched_at = token.fetched_at().0,
                    token.expiry = token.expiry().0,
                    "cached new access token"
                );
                Ok::<_, TokenCacheError<S::Error>>(token)
            }
            .instrument(tracing::Span::current()),
        );

        refresh.await?
    }
}

impl<S, C> Clone for TokenCache<S, C> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            lifetime_config: Arc::clone(&self.lifetime_config),
            entry: Arc::clone(&self.entry),
        }
    }
}

impl<S, C> fmt::Debug for TokenCache<S, C>
where
    S: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("source", &self.source)
            .field("lifetime_config", &self.lifetime_config)
            .finish_non_exhaustive()
    }
}

/// An error while obtaining a token through a [`TokenCache`]
#[derive(Debug, Error)]
pub enum TokenCacheError<E> {
    /// The token source failed
    #[error(transparent)]
    Source(E),
    /// The task performing the fetch panicked or was cancelled by the runtime
    #[error("token refresh task did not complete")]
    RefreshTask(#[from] JoinError),
}

impl<E> TokenCacheError<E> {
    /// The token source's error, if that is what failed
    pub fn source_error(&self) -> Option<&E> {
        match self {
            Self::Source(e) => Some(e),
            Self::RefreshTask(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use rpcauth_clock::{DurationSecs, TestClock, UnixTime};

    use super::*;
    use crate::{IssuedToken, DEFAULT_TOKEN_TTL};

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl CountingSource {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl AsyncTokenSource for CountingSource {
        type Error = io::Error;

        async fn request_token(&self) -> Result<IssuedToken, Self::Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "rejected"));
            }
            Ok(IssuedToken::bearer(format!("token-{}", n)))
        }
    }

    fn cache_with_clock(
        source: CountingSource,
    ) -> (TokenCache<CountingSource, TestClock>, TestClock) {
        let clock = TestClock::new(UnixTime(1_000));
        let cache = TokenCache::with_lifetime_config(
            source,
            TokenLifetimeConfig::default().with_clock(clock.clone()),
        );
        (cache, clock)
    }

    fn calls(cache: &TokenCache<CountingSource, TestClock>) -> usize {
        cache.source.calls.load(Ordering::SeqCst)
    }

    mod when_cache_is_empty {
        use super::*;

        #[tokio::test]
        async fn first_request_fetches_exactly_once() {
            let (cache, _) = cache_with_clock(CountingSource::default());

            let token = cache.get_valid().await.unwrap();

            assert_eq!(token.access_token().as_str(), "token-1");
            assert_eq!(token.fetched_at(), UnixTime(1_000));
            assert_eq!(calls(&cache), 1);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_requests_share_one_fetch() {
            let (cache, _) = cache_with_clock(CountingSource::slow(Duration::from_millis(50)));

            let handles: Vec<_> = (0..32)
                .map(|_| {
                    let cache = cache.clone();
                    tokio::spawn(async move { cache.get_valid().await.unwrap() })
                })
                .collect();

            for handle in handles {
                let token = handle.await.unwrap();
                assert_eq!(token.access_token().as_str(), "token-1");
            }

            assert_eq!(calls(&cache), 1);
        }

        #[tokio::test]
        async fn failed_fetch_is_not_cached() {
            let (cache, _) = cache_with_clock(CountingSource::default());
            cache.source.failing.store(true, Ordering::SeqCst);

            let err = cache.get_valid().await.unwrap_err();
            assert!(err.source_error().is_some());
            assert!(cache.cached().await.is_none());

            cache.source.failing.store(false, Ordering::SeqCst);
            let token = cache.get_valid().await.unwrap();

            assert_eq!(token.access_token().as_str(), "token-2");
            assert_eq!(calls(&cache), 2);
        }

        #[tokio::test]
        async fn dropped_caller_does_not_cancel_shared_fetch() {
            let (cache, _) = cache_with_clock(CountingSource::slow(Duration::from_millis(100)));

            let abandoned =
                tokio::time::timeout(Duration::from_millis(10), cache.get_valid()).await;
            assert!(abandoned.is_err());

            let token = cache.get_valid().await.unwrap();

            assert_eq!(token.access_token().as_str(), "token-1");
            assert_eq!(calls(&cache), 1);
        }
    }

    mod when_cache_holds_a_token {
        use super::*;

        #[tokio::test]
        async fn token_younger_than_ttl_is_reused() {
            let (cache, clock) = cache_with_clock(CountingSource::default());
            let first = cache.get_valid().await.unwrap();

            clock.advance(DEFAULT_TOKEN_TTL.saturating_sub(DurationSecs(1)));
            let second = cache.get_valid().await.unwrap();

            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(calls(&cache), 1);
        }

        #[tokio::test]
        async fn expired_token_is_replaced_by_one_fetch() {
            let (cache, clock) = cache_with_clock(CountingSource::default());
            let first = cache.get_valid().await.unwrap();

            clock.advance(DEFAULT_TOKEN_TTL);
            let second = cache.get_valid().await.unwrap();
            let third = cache.get_valid().await.unwrap();

            assert_eq!(first.access_token().as_str(), "token-1");
            assert_eq!(second.access_token().as_str(), "token-2");
            assert!(Arc::ptr_eq(&second, &third));
            assert_eq!(second.fetched_at(), UnixTime(1_000) + DEFAULT_TOKEN_TTL);
            assert_eq!(calls(&cache), 2);
        }

        #[tokio::test]
        async fn failed_refresh_leaves_prior_token_in_place() {
            let (cache, clock) = cache_with_clock(CountingSource::default());
            let first = cache.get_valid().await.unwrap();

            clock.advance(DEFAULT_TOKEN_TTL);
            cache.source.failing.store(true, Ordering::SeqCst);
            assert!(cache.get_valid().await.is_err());

            let still_cached = cache.cached().await.unwrap();
            assert!(Arc::ptr_eq(&first, &still_cached));

            cache.source.failing.store(false, Ordering::SeqCst);
            let refreshed = cache.get_valid().await.unwrap();
            assert_eq!(refreshed.access_token().as_str(), "token-3");
        }

        #[tokio::test]
        async fn invalidate_forces_a_new_fetch() {
            let (cache, _) = cache_with_clock(CountingSource::default());
            cache.get_valid().await.unwrap();

            cache.invalidate().await;
            let token = cache.get_valid().await.unwrap();

            assert_eq!(token.access_token().as_str(), "token-2");
        }
    }
}
