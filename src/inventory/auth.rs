//! Bearer token for the inventory provider.
//!
//! The token endpoint is queried with static credentials passed as headers.
//! The token is cached process-wide and treated as valid for [`TOKEN_TTL`]
//! after it was obtained, which leaves a margin before the provider's own
//! expiry.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::logging::{self, Source};
use crate::model::InventoryError;

pub const TOKEN_TTL: Duration = Duration::from_secs(580);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    items: Option<TokenItems>,
}

#[derive(Debug, Deserialize)]
struct TokenItems {
    #[serde(rename = "tokenautenticacao")]
    token: Option<String>,
}

// ============================================================================
// Token cache
// ============================================================================

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Holds one bearer token with an explicit expiry instant.
///
/// Reads and refreshes may race: two callers can both see an expired token
/// and both refetch. The later write wins and both tokens are valid.
#[derive(Debug)]
pub struct TokenCache {
    ttl: Duration,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Cached token if still fresh at `now`.
    fn fresh(&self, now: Instant) -> Option<String> {
        let slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref()
            .filter(|cached| now < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    /// Return the cached token, or call `fetch` and cache its result.
    ///
    /// The lock is not held while `fetch` runs. Fetch errors are returned
    /// unchanged and leave the cache as it was.
    pub fn get_or_refresh<F>(&self, fetch: F) -> Result<String, InventoryError>
    where
        F: FnOnce() -> Result<String, InventoryError>,
    {
        if let Some(token) = self.fresh(Instant::now()) {
            return Ok(token);
        }

        let token = fetch()?;
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(token)
    }

    /// Drop the cached token so the next call refetches.
    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(TOKEN_TTL)
    }
}

// ============================================================================
// Auth service
// ============================================================================

/// Source of the `Authorization` header for inventory requests.
pub trait BearerSource {
    fn bearer(&self) -> Result<String, InventoryError>;

    /// Forget the current token, e.g. after the provider rejected it.
    fn invalidate(&self);
}

/// Fetches and caches the inventory provider's bearer token.
pub struct InventoryAuth {
    client: reqwest::blocking::Client,
    auth_url: String,
    identifier: String,
    password: String,
    cache: TokenCache,
}

impl InventoryAuth {
    pub fn new(
        client: reqwest::blocking::Client,
        auth_url: impl Into<String>,
        identifier: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            identifier: identifier.into(),
            password: password.into(),
            cache: TokenCache::default(),
        }
    }

    fn fetch_token(&self) -> Result<String, InventoryError> {
        logging::debug(Source::Auth, None, "requesting inventory token");

        let response = self
            .client
            .get(&self.auth_url)
            .header("identificador", &self.identifier)
            .header("senha", &self.password)
            .send()?;

        if !response.status().is_success() {
            return Err(InventoryError::Http(response.status().as_u16()));
        }

        let body: TokenResponse = response.json()?;
        parse_token(body)
    }
}

impl BearerSource for InventoryAuth {
    /// `Authorization` header value, refreshed when the cached token is stale.
    ///
    /// Token endpoint failures are returned to the caller as-is.
    fn bearer(&self) -> Result<String, InventoryError> {
        let token = self.cache.get_or_refresh(|| self.fetch_token())?;
        Ok(format!("Bearer {}", token))
    }

    fn invalidate(&self) {
        logging::debug(Source::Auth, None, "inventory token rejected, clearing cache");
        self.cache.clear();
    }
}

fn parse_token(body: TokenResponse) -> Result<String, InventoryError> {
    body.items
        .and_then(|items| items.token)
        .filter(|token| !token.trim().is_empty())
        .ok_or(InventoryError::MissingToken)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_cache_fetches_once_while_fresh() {
        let cache = TokenCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok(format!("token-{}", calls.get()))
        };

        assert_eq!(cache.get_or_refresh(fetch).unwrap(), "token-1");
        assert_eq!(cache.get_or_refresh(fetch).unwrap(), "token-1");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cache_refetches_after_expiry() {
        let cache = TokenCache::new(Duration::ZERO);
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok(format!("token-{}", calls.get()))
        };

        assert_eq!(cache.get_or_refresh(fetch).unwrap(), "token-1");
        assert_eq!(cache.get_or_refresh(fetch).unwrap(), "token-2");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_fetch_error_propagates_and_is_not_cached() {
        let cache = TokenCache::new(Duration::from_secs(60));

        let err = cache
            .get_or_refresh(|| Err(InventoryError::Http(503)))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Http(503)));

        assert_eq!(cache.get_or_refresh(|| Ok("ok".to_string())).unwrap(), "ok");
    }

    #[test]
    fn test_clear_forces_refetch() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.get_or_refresh(|| Ok("first".to_string())).unwrap();
        cache.clear();
        assert_eq!(
            cache.get_or_refresh(|| Ok("second".to_string())).unwrap(),
            "second"
        );
    }

    #[test]
    fn test_cache_shared_across_threads() {
        const THREADS: usize = 8;
        let cache = TokenCache::new(Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);

        let tokens: Vec<String> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        cache.get_or_refresh(|| {
                            let n = fetches.fetch_add(1, Ordering::SeqCst) + 1;
                            Ok(format!("token-{}", n))
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("reader thread panicked").unwrap())
                .collect()
        });

        assert_eq!(tokens.len(), THREADS);
        assert!(tokens.iter().all(|token| token.starts_with("token-")));

        let fetched = fetches.load(Ordering::SeqCst);
        assert!(
            (1..=THREADS).contains(&fetched),
            "expected between 1 and {} fetches, got {}",
            THREADS,
            fetched
        );

        // Once settled, every reader sees the same cached token.
        let settled = cache
            .get_or_refresh(|| panic!("fresh token must not be refetched"))
            .unwrap();
        assert!(tokens.contains(&settled));
    }

    #[test]
    fn test_default_ttl_is_580_seconds() {
        assert_eq!(TOKEN_TTL, Duration::from_secs(580));
    }

    #[test]
    fn test_parse_token_body() {
        let body: TokenResponse =
            serde_json::from_str(r#"{"items": {"tokenautenticacao": "abc"}}"#).unwrap();
        assert_eq!(parse_token(body).unwrap(), "abc");

        let empty: TokenResponse = serde_json::from_str(r#"{"items": null}"#).unwrap();
        assert!(matches!(parse_token(empty), Err(InventoryError::MissingToken)));
    }
}
