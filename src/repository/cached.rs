//! TTL cache in front of another repository
//!
//! Lookups by id and by type are cached under `joke:{id}` and
//! `jokes:type:{type}`. Random lookups and health checks always go to the
//! wrapped repository. Expired entries are dropped lazily on lookup, or in bulk
//! by [`CachedJokeRepository::invalidate_all_expired`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::jokes::{Joke, JokeCollection, JokeType};
use crate::repository::{JokeRepository, RepositoryResult};

/// Default time-to-live for cached jokes
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A value held by the cache
#[derive(Debug, Clone)]
enum CachedValue {
    Joke(Arc<Joke>),
    Jokes(Arc<JokeCollection>),
}

/// Conversion between repository values and cache slots
trait Cacheable: Sized {
    fn into_cached(value: Arc<Self>) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Arc<Self>>;
}

impl Cacheable for Joke {
    fn into_cached(value: Arc<Self>) -> CachedValue {
        CachedValue::Joke(value)
    }

    fn from_cached(value: CachedValue) -> Option<Arc<Self>> {
        match value {
            CachedValue::Joke(joke) => Some(joke),
            CachedValue::Jokes(_) => None,
        }
    }
}

impl Cacheable for JokeCollection {
    fn into_cached(value: Arc<Self>) -> CachedValue {
        CachedValue::Jokes(value)
    }

    fn from_cached(value: CachedValue) -> Option<Arc<Self>> {
        match value {
            CachedValue::Jokes(jokes) => Some(jokes),
            CachedValue::Joke(_) => None,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: CachedValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    /// An entry is live only while its expiry lies in the future
    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of a cache lookup
#[derive(Debug)]
enum CacheLookup {
    Hit(CachedValue),
    Miss,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Snapshot of cache performance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
    pub cache_size: usize,
}

impl CacheStats {
    fn from_state(state: &CacheState) -> Self {
        let total_requests = state.hits + state.misses;
        let hit_rate_percent = if total_requests == 0 {
            0.0
        } else {
            let rate = state.hits as f64 / total_requests as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        };

        Self {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            total_requests,
            hit_rate_percent,
            cache_size: state.entries.len(),
        }
    }
}

/// Repository decorator adding an in-memory TTL cache
///
/// The store and counters sit behind one mutex that is never held across an
/// upstream call, so two concurrent misses on the same key may both fetch.
pub struct CachedJokeRepository<R> {
    inner: R,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl<R: JokeRepository> CachedJokeRepository<R> {
    /// Wrap `inner` with a cache whose entries live for `ttl`
    pub fn new(inner: R, ttl: Duration) -> Self {
        tracing::info!(
            "CachedJokeRepository initialized with TTL={}s, wrapping {}",
            ttl.as_secs_f64(),
            inner.describe()
        );

        Self {
            inner,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Wrap `inner` with the default five-minute TTL
    pub fn with_default_ttl(inner: R) -> Self {
        Self::new(inner, DEFAULT_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Current counters and size
    pub fn stats(&self) -> CacheStats {
        CacheStats::from_state(&self.lock())
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let removed = state.entries.len();
        state.entries.clear();
        tracing::info!("Cache cleared - removed {} entries", removed);
        removed
    }

    /// Remove every expired entry, counting each as an eviction
    pub fn invalidate_all_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - state.entries.len();
        state.evictions += removed as u64;

        if removed > 0 {
            tracing::debug!("Cleared {} expired cache entries", removed);
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Counters stay meaningful even if a holder panicked
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &str) -> CacheLookup {
        let now = Instant::now();
        let mut state = self.lock();

        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.is_expired_at(now), entry.value.clone()));

        match found {
            Some((false, value)) => {
                state.hits += 1;
                tracing::debug!("Cache HIT for key: {}", key);
                return CacheLookup::Hit(value);
            }
            Some((true, _)) => {
                state.entries.remove(key);
                state.evictions += 1;
                tracing::debug!("Cache entry expired and evicted: {}", key);
            }
            None => {}
        }

        state.misses += 1;
        tracing::debug!("Cache MISS for key: {}", key);
        CacheLookup::Miss
    }

    fn store(&self, key: String, value: CachedValue) {
        tracing::debug!("Cached value for key: {} (TTL={}s)", key, self.ttl.as_secs_f64());
        self.lock()
            .entries
            .insert(key, CacheEntry::new(value, self.ttl));
    }

    /// Serve `key` from the cache, or run `fetch` and remember its result
    async fn cached<T, Fut>(&self, key: String, fetch: Fut) -> RepositoryResult<Arc<T>>
    where
        T: Cacheable + Send + Sync,
        Fut: Future<Output = RepositoryResult<Arc<T>>> + Send,
    {
        if let CacheLookup::Hit(value) = self.lookup(&key) {
            if let Some(hit) = T::from_cached(value) {
                return Ok(hit);
            }
        }

        let fresh = fetch.await?;
        self.store(key, T::into_cached(Arc::clone(&fresh)));
        Ok(fresh)
    }
}

fn joke_key(joke_id: u32) -> String {
    format!("joke:{}", joke_id)
}

fn jokes_by_type_key(joke_type: JokeType) -> String {
    format!("jokes:type:{}", joke_type)
}

#[async_trait]
impl<R: JokeRepository> JokeRepository for CachedJokeRepository<R> {
    async fn get_random_joke(&self) -> RepositoryResult<Arc<Joke>> {
        tracing::debug!("Fetching random joke (not cached)");
        self.inner.get_random_joke().await
    }

    async fn get_random_jokes(&self, count: usize) -> RepositoryResult<Arc<JokeCollection>> {
        tracing::debug!("Fetching {} random jokes (not cached)", count);
        self.inner.get_random_jokes(count).await
    }

    async fn get_joke_by_id(&self, joke_id: u32) -> RepositoryResult<Arc<Joke>> {
        self.cached(joke_key(joke_id), self.inner.get_joke_by_id(joke_id))
            .await
    }

    async fn get_jokes_by_type(
        &self,
        joke_type: JokeType,
    ) -> RepositoryResult<Arc<JokeCollection>> {
        self.cached(
            jokes_by_type_key(joke_type),
            self.inner.get_jokes_by_type(joke_type),
        )
        .await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    fn describe(&self) -> String {
        let stats = self.stats();
        format!(
            "CachedJokeRepository(repository={}, ttl={}s, cache_size={}, hit_rate={}%)",
            self.inner.describe(),
            self.ttl.as_secs_f64(),
            stats.cache_size,
            stats.hit_rate_percent
        )
    }
}

/// Spawn a task that sweeps expired entries every `interval`
///
/// Abort the returned handle on shutdown.
pub fn spawn_sweeper<R>(cache: Arc<CachedJokeRepository<R>>, interval: Duration) -> JoinHandle<()>
where
    R: JokeRepository + 'static,
{
    tokio::spawn(async move {
        tracing::info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.invalidate_all_expired();
            let stats = cache.stats();
            tracing::debug!(
                removed,
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                cache_size = stats.cache_size,
                "Cache sweep finished"
            );
        }
    })
}
