use std::{collections::HashMap, fmt::Display, future::Future, str::FromStr, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, warn};

/// How `cache_or_fetch` chooses between a stored entry and the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// A usable entry is returned without calling the fetcher.
    #[default]
    CacheFirst,
    /// The fetcher always runs; the entry is only used when it fails.
    NetworkFirst,
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cache_first" => Ok(Self::CacheFirst),
            "network_first" => Ok(Self::NetworkFirst),
            other => Err(format!("unknown cache policy '{other}'")),
        }
    }
}

struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

/// Process-wide table of fetched values keyed by string.
///
/// Values are held as JSON so one table can serve differently typed
/// fetchers. A failed fetch never writes, and the fallback is never stored.
pub struct CacheLayer {
    policy: CachePolicy,
    ttl: Option<Duration>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheLayer {
    pub fn new(policy: CachePolicy, ttl: Option<Duration>) -> Self {
        Self {
            policy,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Under `CacheFirst` a fresh entry is returned as is; otherwise the
    /// fetcher runs and its result is stored. A failed fetch yields the
    /// fallback, or under `NetworkFirst` the existing entry if there is one.
    pub async fn cache_or_fetch<T, E, F, Fut>(&self, fetcher: F, key: &str, fallback: T) -> T
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.policy {
            CachePolicy::CacheFirst => {
                if let Some(cached) = self.lookup::<T>(key, true).await {
                    debug!(key, "cache hit");
                    return cached;
                }
                match fetcher().await {
                    Ok(value) => {
                        self.store(key, &value).await;
                        value
                    }
                    Err(err) => {
                        warn!(key, error = %err, "fetch failed; serving fallback");
                        fallback
                    }
                }
            }
            CachePolicy::NetworkFirst => self.revalidate(fetcher, key, fallback).await,
        }
    }

    /// Always runs the fetcher, whatever the policy. On failure the existing
    /// entry, even an expired one, is preferred over the fallback.
    pub async fn revalidate<T, E, F, Fut>(&self, fetcher: F, key: &str, fallback: T) -> T
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match fetcher().await {
            Ok(value) => {
                self.store(key, &value).await;
                value
            }
            Err(err) => match self.lookup::<T>(key, false).await {
                Some(cached) => {
                    warn!(key, error = %err, "fetch failed; serving cached value");
                    cached
                }
                None => {
                    warn!(key, error = %err, "fetch failed; serving fallback");
                    fallback
                }
            },
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key, false).await
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        self.store(key, value).await;
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str, require_fresh: bool) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if require_fresh && self.is_expired(entry) {
            debug!(key, "cache entry expired");
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "cached value has unexpected shape; ignoring");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "value is not cacheable");
                return;
            }
        };
        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl.is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new(CachePolicy::default(), None)
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
