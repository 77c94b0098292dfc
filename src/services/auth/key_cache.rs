//! Time-bounded cache in front of a `KeySource`.
//!
//! - One cached key set per wrapped source (one source per issuer).
//! - An entry is never served at or past its TTL.
//! - Concurrent misses coalesce: the refresh lock is taken, the entry is re-checked, and only
//!   the first waiter actually goes upstream.
//! - A token naming a `kid` the cached set does not know counts as a miss, throttled by
//!   `min_refresh_interval` so random kids cannot hammer the issuer.
//! - A signature failure against a cached set (kid-less tokens after a rotation) drops the
//!   entry, under the same throttle.
//! - Fetch errors are not cached.
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::services::auth::error::AuthError;
use crate::services::auth::jwks::{KeySet, KeySource, PublicKeyRecord};

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default floor between two kid-miss refreshes.
pub const DEFAULT_MIN_REFRESH_SECONDS: u64 = 10;

struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

pub struct CachedKeySource<S> {
    inner: S,
    ttl: Duration,
    min_refresh_interval: Duration,
    entry: RwLock<Option<CachedKeySet>>,
    // Held while a fetch is in flight.
    refresh: Mutex<()>,
}

impl<S> std::fmt::Debug for CachedKeySource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedKeySource")
            .field("ttl", &self.ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}

impl<S: KeySource> CachedKeySource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_SECONDS),
            entry: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop the cached key set; the next fetch goes upstream.
    pub async fn invalidate(&self) {
        let mut entry = self.entry.write().await;
        *entry = None;
        tracing::debug!("jwks cache invalidated");
    }

    /// Cached set usable for `kid`, if any.
    async fn lookup(&self, kid: Option<&str>) -> Option<Arc<KeySet>> {
        let entry = self.entry.read().await;
        let cached = entry.as_ref()?;

        if cached.age() >= self.ttl {
            return None;
        }
        match kid {
            Some(kid) if !cached.keys.contains_kid(kid) => None,
            _ => Some(cached.keys.clone()),
        }
    }

    async fn refresh(&self, kid: Option<&str>) -> Result<Arc<KeySet>, AuthError> {
        let _in_flight = self.refresh.lock().await;

        // Another task may have refreshed while we were waiting.
        {
            let entry = self.entry.read().await;
            if let Some(cached) = entry.as_ref() {
                let age = cached.age();
                if age < self.ttl {
                    let known = kid.is_none_or(|kid| cached.keys.contains_kid(kid));
                    if known {
                        return Ok(cached.keys.clone());
                    }
                    if age < self.min_refresh_interval {
                        tracing::debug!(?kid, "unknown kid, refresh throttled");
                        return Ok(cached.keys.clone());
                    }
                    tracing::info!(?kid, "unknown kid, refreshing jwks");
                }
            }
        }

        let keys = self.inner.fetch_key_set().await?;

        let mut entry = self.entry.write().await;
        *entry = Some(CachedKeySet {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        tracing::debug!(key_count = keys.len(), "jwks cache refreshed");

        Ok(keys)
    }
}

#[async_trait]
impl<S: KeySource> KeySource for CachedKeySource<S> {
    async fn fetch_key_set(&self) -> Result<Arc<KeySet>, AuthError> {
        match self.lookup(None).await {
            Some(keys) => Ok(keys),
            None => self.refresh(None).await,
        }
    }

    async fn fetch(&self, kid: Option<&str>) -> Result<PublicKeyRecord, AuthError> {
        let keys = match self.lookup(kid).await {
            Some(keys) => keys,
            None => self.refresh(kid).await?,
        };
        keys.select(kid)
    }

    async fn invalidate_after_rejection(&self) -> bool {
        let mut entry = self.entry.write().await;
        match entry.as_ref() {
            Some(cached) if cached.age() >= self.min_refresh_interval => {
                *entry = None;
                tracing::info!("signature rejected by cached jwks, invalidating");
                true
            }
            Some(_) => {
                tracing::debug!("signature rejected by cached jwks, refresh throttled");
                false
            }
            None => false,
        }
    }
}
