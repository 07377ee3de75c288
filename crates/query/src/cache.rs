//! Response cache honouring fetch policies.

#![forbid(unsafe_code)]

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::source::{FetchPolicy, QueryError, QueryRequest, QueryResult, QuerySource};

/// Wraps a source and caches successful responses by query + variables.
///
/// - `cache-first`: cached response if present, else fetch and store
/// - `cache-and-network`: fetch and store; a failed fetch falls back to the cached response
/// - `network-only`: always fetch, store the result
/// - `cache-only`: cached response or `CacheMiss`
/// - `no-cache`: always fetch, never store
///
/// At most `cap` responses are kept; storing a new key past the cap evicts the
/// oldest stored key first.
pub struct CachedSource<S> {
    inner: S,
    entries: Mutex<Entries>,
}

/// Default number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Keyed responses with FIFO order and fixed capacity.
struct Entries {
    map: FxHashMap<String, Value>,
    order: VecDeque<String>,
    cap: usize,
}

impl Entries {
    fn insert(&mut self, key: String, value: Value) {
        if !self.map.contains_key(&key) {
            if self.order.len() >= self.cap {
                if let Some(old) = self.order.pop_front() {
                    self.map.remove(&old);
                    metrics::counter!("tably_cache_evictions_total", 1u64);
                    debug!(key = %old, "cache entry evicted");
                }
            }
            self.order.push_back(key.clone());
        }
        self.map.insert(key, value);
    }
}

impl<S: QuerySource> CachedSource<S> {
    pub fn new(inner: S) -> Self { Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY) }

    /// A cap of zero keeps nothing, so every cache read misses.
    pub fn with_capacity(inner: S, cap: usize) -> Self {
        let entries = Entries { map: FxHashMap::default(), order: VecDeque::new(), cap };
        Self { inner, entries: Mutex::new(entries) }
    }

    pub fn inner(&self) -> &S { &self.inner }

    pub async fn len(&self) -> usize { self.entries.lock().await.map.len() }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.map.clear();
        entries.order.clear();
    }

    async fn cached(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.map.get(key).cloned()
    }

    async fn store(&self, key: String, value: &Value) {
        let mut entries = self.entries.lock().await;
        if entries.cap == 0 {
            return;
        }
        entries.insert(key, value.clone());
    }
}

#[async_trait::async_trait]
impl<S: QuerySource> QuerySource for CachedSource<S> {
    async fn fetch(&self, request: &QueryRequest) -> QueryResult<Value> {
        let key = request.cache_key();
        match request.fetch_policy {
            FetchPolicy::CacheFirst => {
                if let Some(v) = self.cached(&key).await {
                    debug!(query = %request.query, "cache hit");
                    return Ok(v);
                }
                let v = self.inner.fetch(request).await?;
                self.store(key, &v).await;
                Ok(v)
            }
            FetchPolicy::CacheAndNetwork => match self.inner.fetch(request).await {
                Ok(v) => {
                    self.store(key, &v).await;
                    Ok(v)
                }
                Err(e) => match self.cached(&key).await {
                    Some(v) => {
                        warn!(error = %e, query = %request.query, "fetch failed; serving cached response");
                        Ok(v)
                    }
                    None => Err(e),
                },
            },
            FetchPolicy::NetworkOnly => {
                let v = self.inner.fetch(request).await?;
                self.store(key, &v).await;
                Ok(v)
            }
            FetchPolicy::CacheOnly => self.cached(&key).await.ok_or_else(|| QueryError::CacheMiss(request.query.clone())),
            FetchPolicy::NoCache => self.inner.fetch(request).await,
        }
    }
}
