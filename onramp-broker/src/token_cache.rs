//! Per-key access-token cache with singleflight refresh
//!
//! One slot per `(principal, provider, environment)` key. A slot either
//! holds a usable token or a refresh in flight; concurrent callers for the
//! same key subscribe to the in-flight result instead of issuing their own
//! token exchange, so refreshes for a key are totally ordered.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::BrokerError;

/// Composite cache key. Displayed as `principal|provider|environment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub principal: String,
    pub provider: String,
    pub environment: String,
}

impl TokenKey {
    pub fn new(
        principal: impl Into<String>,
        provider: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            provider: provider.into(),
            environment: environment.into(),
        }
    }

    /// Key for the platform's own service credentials.
    pub fn platform(provider: impl Into<String>, environment: impl Into<String>) -> Self {
        Self::new("platform", provider, environment)
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.principal, self.provider, self.environment
        )
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Result distributed to refresh subscribers. The error is pre-rendered so
/// it can be cloned to every waiter.
type RefreshOutcome = Result<CachedToken, String>;

enum Slot {
    Ready(CachedToken),
    Refreshing(watch::Receiver<Option<RefreshOutcome>>),
}

/// What a caller should do for a key, decided under the map lock.
enum Plan {
    Hit(String),
    Wait(watch::Receiver<Option<RefreshOutcome>>),
    Fetch(
        watch::Sender<Option<RefreshOutcome>>,
        watch::Receiver<Option<RefreshOutcome>>,
    ),
}

pub struct TokenCache {
    slots: Mutex<HashMap<TokenKey, Slot>>,
    refresh_buffer: chrono::Duration,
}

impl TokenCache {
    /// `refresh_buffer_secs`: a token within this many seconds of expiry is
    /// treated as already stale and refreshed before use.
    pub fn new(refresh_buffer_secs: u64) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            refresh_buffer: chrono::Duration::seconds(refresh_buffer_secs as i64),
        }
    }

    /// Return a currently-valid token for `key`, refreshing through `fetch`
    /// if needed. `fetch` performs the actual token exchange and resolves to
    /// `(token, expires_in_seconds)`; it is invoked by at most one caller
    /// per key at a time, and its failure is propagated to every caller
    /// waiting on the same refresh.
    pub async fn get_or_refresh<F, Fut>(&self, key: &TokenKey, fetch: F) -> Result<String, BrokerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, u64), BrokerError>>,
    {
        let plan = {
            let mut slots = self.slots.lock().unwrap();
            match slots.get(key) {
                Some(Slot::Ready(cached)) if self.is_fresh(cached) => {
                    Plan::Hit(cached.token.clone())
                }
                Some(Slot::Refreshing(rx)) => Plan::Wait(rx.clone()),
                _ => {
                    let (tx, rx) = watch::channel(None);
                    slots.insert(key.clone(), Slot::Refreshing(rx.clone()));
                    Plan::Fetch(tx, rx)
                }
            }
        };

        match plan {
            Plan::Hit(token) => Ok(token),
            Plan::Wait(mut rx) => self.wait_for_refresh(key, &mut rx).await,
            Plan::Fetch(tx, my_rx) => self.run_refresh(key, fetch, tx, my_rx).await,
        }
    }

    /// Drop the cached token and any in-flight refresh bookkeeping for
    /// `key`. The next `get_or_refresh` performs a fresh fetch. Callers use
    /// this after the provider rejects a cached token.
    pub fn invalidate(&self, key: &TokenKey) {
        if self.slots.lock().unwrap().remove(key).is_some() {
            tracing::debug!(key = %key, "invalidated cached token");
        }
    }

    /// Remove entries whose expiry has already passed, bounding memory for
    /// keys that have gone cold. Returns the number of entries removed.
    pub fn sweep(&self) -> u64 {
        let now = Utc::now();
        let mut slots = self.slots.lock().unwrap();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Ready(cached) => cached.expires_at > now,
            Slot::Refreshing(_) => true,
        });
        (before - slots.len()) as u64
    }

    fn is_fresh(&self, cached: &CachedToken) -> bool {
        cached.expires_at - Utc::now() > self.refresh_buffer
    }

    async fn wait_for_refresh(
        &self,
        key: &TokenKey,
        rx: &mut watch::Receiver<Option<RefreshOutcome>>,
    ) -> Result<String, BrokerError> {
        let abandoned = || BrokerError::TokenRefresh {
            key: key.to_string(),
            reason: "refresh abandoned before completion".to_string(),
        };

        let outcome = rx
            .wait_for(|value| value.is_some())
            .await
            .map_err(|_| abandoned())?
            .clone();

        match outcome {
            Some(Ok(cached)) => Ok(cached.token),
            Some(Err(reason)) => Err(BrokerError::TokenRefresh {
                key: key.to_string(),
                reason,
            }),
            None => Err(abandoned()),
        }
    }

    async fn run_refresh<F, Fut>(
        &self,
        key: &TokenKey,
        fetch: F,
        tx: watch::Sender<Option<RefreshOutcome>>,
        my_rx: watch::Receiver<Option<RefreshOutcome>>,
    ) -> Result<String, BrokerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, u64), BrokerError>>,
    {
        let result = fetch().await;

        let mut slots = self.slots.lock().unwrap();
        // Only this flight's own marker may be replaced: an invalidate (or a
        // newer flight) that raced the fetch wins over its result.
        let still_current =
            matches!(slots.get(key), Some(Slot::Refreshing(rx)) if rx.same_channel(&my_rx));

        match result {
            Ok((token, expires_in)) => {
                let cached = CachedToken {
                    token: token.clone(),
                    expires_at: Utc::now() + chrono::Duration::seconds(expires_in as i64),
                };
                if still_current {
                    slots.insert(key.clone(), Slot::Ready(cached.clone()));
                }
                drop(slots);
                tracing::debug!(key = %key, expires_in, "refreshed access token");
                let _ = tx.send(Some(Ok(cached)));
                Ok(token)
            }
            Err(err) => {
                if still_current {
                    slots.remove(key);
                }
                drop(slots);
                tracing::warn!(key = %key, error = %err, "token refresh failed");
                let _ = tx.send(Some(Err(err.to_string())));
                Err(err)
            }
        }
    }
}

/// Run `cache.sweep()` on a fixed interval until the task is dropped.
pub fn spawn_sweeper(cache: Arc<TokenCache>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = cache.sweep();
            if removed > 0 {
                tracing::debug!(removed, "swept expired token cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn key() -> TokenKey {
        TokenKey::platform("cybrid", "sandbox")
    }

    fn counting_fetcher(
        calls: &Arc<AtomicU32>,
        token: &str,
        expires_in: u64,
    ) -> impl Future<Output = Result<(String, u64), BrokerError>> {
        let calls = calls.clone();
        let token = token.to_string();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok((token, expires_in))
        }
    }

    #[tokio::test]
    async fn test_singleflight_deduplicates_concurrent_refreshes() {
        let cache = TokenCache::new(120);
        let calls = Arc::new(AtomicU32::new(0));
        let k = key();

        let (a, b, c, d) = tokio::join!(
            cache.get_or_refresh(&k, || counting_fetcher(&calls, "tok-1", 3600)),
            cache.get_or_refresh(&k, || counting_fetcher(&calls, "tok-2", 3600)),
            cache.get_or_refresh(&k, || counting_fetcher(&calls, "tok-3", 3600)),
            cache.get_or_refresh(&k, || counting_fetcher(&calls, "tok-4", 3600)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = a.unwrap();
        assert_eq!(first, "tok-1");
        assert_eq!(b.unwrap(), first);
        assert_eq!(c.unwrap(), first);
        assert_eq!(d.unwrap(), first);
    }

    #[tokio::test]
    async fn test_distinct_keys_refresh_independently() {
        let cache = TokenCache::new(120);
        let calls = Arc::new(AtomicU32::new(0));
        let other = TokenKey::new("merchant-7", "cybrid", "sandbox");
        let k = key();

        let (a, b) = tokio::join!(
            cache.get_or_refresh(&k, || counting_fetcher(&calls, "tok-a", 3600)),
            cache.get_or_refresh(&other, || counting_fetcher(&calls, "tok-b", 3600)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.unwrap(), "tok-a");
        assert_eq!(b.unwrap(), "tok-b");
    }

    #[tokio::test]
    async fn test_serves_cached_token_outside_buffer() {
        let cache = TokenCache::new(120);
        let calls = Arc::new(AtomicU32::new(0));

        // 121s of validity leaves more than the 120s buffer
        let first = cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-1", 121))
            .await
            .unwrap();
        let second = cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-2", 3600))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_refreshes_inside_buffer_window() {
        let cache = TokenCache::new(120);
        let calls = Arc::new(AtomicU32::new(0));

        // 119s of validity is already inside the 120s buffer
        cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-1", 119))
            .await
            .unwrap();
        let second = cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-2", 3600))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(second, "tok-2");
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = TokenCache::new(120);
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-1", 3600))
            .await
            .unwrap();
        cache.invalidate(&key());
        let second = cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-2", 3600))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(second, "tok-2");
    }

    #[tokio::test]
    async fn test_refresh_failure_propagates_to_waiters() {
        let cache = TokenCache::new(120);
        let calls = Arc::new(AtomicU32::new(0));

        let failing = |calls: &Arc<AtomicU32>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(BrokerError::Internal("exchange unreachable".to_string()))
            }
        };

        let k = key();
        let (a, b) = tokio::join!(
            cache.get_or_refresh(&k, || failing(&calls)),
            cache.get_or_refresh(&k, || failing(&calls)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(a.is_err());
        assert!(b.is_err());

        // nothing was cached; the next call performs a fresh fetch
        let third = cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-2", 3600))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(third, "tok-2");
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_entries() {
        let cache = TokenCache::new(120);
        let calls = Arc::new(AtomicU32::new(0));
        let cold = TokenKey::new("merchant-9", "cybrid", "sandbox");

        cache
            .get_or_refresh(&key(), || counting_fetcher(&calls, "tok-live", 3600))
            .await
            .unwrap();
        cache
            .get_or_refresh(&cold, || counting_fetcher(&calls, "tok-dead", 0))
            .await
            .unwrap();

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.sweep(), 0);
    }
}
