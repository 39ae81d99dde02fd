//! Access-token caching for Firestore requests.
//!
//! Tokens are refreshed a minute before expiry. Concurrent callers share one
//! refresh; if the refresh fails while the old token is still usable, the old
//! token keeps being served.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the token actually expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the provider reports an expiry we cannot convert.
const TOKEN_FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore REST access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Where tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    /// Google service account credentials.
    ServiceAccount(Arc<dyn TokenProvider>),
    /// Fixed bearer token, used against the local emulator.
    Static(String),
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

pub struct TokenCache {
    source: TokenSource,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        let provider = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(provider) => provider,
        };

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited for the write lock.
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        match provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let now = Utc::now();
                let expires_at = if token.expires_at() > now {
                    (token.expires_at() - now)
                        .to_std()
                        .map(|ttl| Instant::now() + ttl)
                        .unwrap_or_else(|_| Instant::now() + TOKEN_FALLBACK_TTL)
                } else {
                    Instant::now()
                };

                let value = token.as_str().to_string();
                *cache = Some(CachedToken {
                    value: value.clone(),
                    expires_at,
                });
                debug!("Refreshed Firestore access token");
                Ok(value)
            }
            Err(e) => match cache.as_ref() {
                Some(cached) if cached.is_usable() => {
                    warn!("Token refresh failed, reusing current token: {}", e);
                    Ok(cached.value.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

/// Token provider that hands out a fixed script of results, in order.
#[cfg(test)]
pub(crate) struct ScriptedTokens {
    /// `Some((token, expires_in_secs))` or `None` for a failed fetch
    script: std::sync::Mutex<std::collections::VecDeque<Option<(&'static str, u64)>>>,
    pub(crate) calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedTokens {
    pub(crate) fn new(script: Vec<Option<(&'static str, u64)>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: Default::default(),
        }
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl TokenProvider for ScriptedTokens {
    async fn token(&self, _scopes: &[&str]) -> Result<Arc<gcp_auth::Token>, gcp_auth::Error> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().flatten();
        match next {
            Some((token, expires_in)) => {
                let json = serde_json::json!({"access_token": token, "expires_in": expires_in});
                Ok(Arc::new(serde_json::from_value(json).unwrap()))
            }
            None => Err(gcp_auth::Error::Str("token endpoint unavailable")),
        }
    }

    async fn project_id(&self) -> Result<Arc<str>, gcp_auth::Error> {
        Ok(Arc::from("test-project"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;

    fn cache_with(script: Vec<Option<(&'static str, u64)>>) -> (TokenCache, Arc<ScriptedTokens>) {
        let provider = Arc::new(ScriptedTokens::new(script));
        let cache = TokenCache::new(TokenSource::ServiceAccount(provider.clone()));
        (cache, provider)
    }

    #[tokio::test]
    async fn test_fresh_token_is_served_from_cache() {
        let (cache, provider) = cache_with(vec![Some(("t1", 3600))]);
        assert_eq!(cache.get_token().await.unwrap(), "t1");
        assert_eq!(cache.get_token().await.unwrap(), "t1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_reuses_usable_token() {
        // Expires inside the refresh margin: usable, but due for refresh
        let (cache, provider) = cache_with(vec![Some(("t1", 30)), None]);
        assert_eq!(cache.get_token().await.unwrap(), "t1");

        assert_eq!(cache.get_token().await.unwrap(), "t1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_without_token_is_auth_error() {
        let (cache, _) = cache_with(vec![None]);
        let err = tokio_test::assert_err!(cache.get_token().await);
        assert!(matches!(err, FirestoreError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (cache, provider) = cache_with(vec![Some(("t1", 3600)), Some(("t2", 3600))]);
        assert_eq!(cache.get_token().await.unwrap(), "t1");
        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "t2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_static_source_returns_fixed_token() {
        let cache = TokenCache::new(TokenSource::Static("owner".to_string()));
        assert_eq!(cache.get_token().await.unwrap(), "owner");
        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "owner");
    }

    #[test]
    fn test_cached_token_freshness() {
        let fresh = CachedToken {
            value: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(fresh.is_fresh());
        assert!(fresh.is_usable());

        let expiring = CachedToken {
            value: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!expiring.is_fresh());
        assert!(expiring.is_usable());
    }

    #[test]
    fn test_scope() {
        assert!(FIRESTORE_SCOPE.ends_with("/datastore"));
    }
}
