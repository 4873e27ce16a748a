//! Joke repositories
//!
//! Tool handlers talk to a [`JokeRepository`] and never to the HTTP client
//! directly. Two implementations exist: [`HttpJokeRepository`] goes straight to
//! the joke API, [`CachedJokeRepository`] wraps any other repository with a
//! TTL cache.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::RepositoryError;
use crate::jokes::{Joke, JokeApiClient, JokeCollection, JokeType};

pub mod cached;
pub mod http;

pub use cached::{spawn_sweeper, CacheStats, CachedJokeRepository};
pub use http::HttpJokeRepository;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Data access contract used by the tool handlers
///
/// Values come back behind `Arc` so a cache can hand out the same instance
/// on every hit.
#[async_trait]
pub trait JokeRepository: Send + Sync {
    /// A random joke. Never repeatable.
    async fn get_random_joke(&self) -> RepositoryResult<Arc<Joke>>;

    /// Up to `count` random jokes
    async fn get_random_jokes(&self, count: usize) -> RepositoryResult<Arc<JokeCollection>>;

    /// The joke with `joke_id`, or `RepositoryError::NotFound`
    async fn get_joke_by_id(&self, joke_id: u32) -> RepositoryResult<Arc<Joke>>;

    /// A non-empty collection of jokes of `joke_type`
    async fn get_jokes_by_type(&self, joke_type: JokeType)
        -> RepositoryResult<Arc<JokeCollection>>;

    /// Liveness of the data source. Never fails.
    async fn health_check(&self) -> bool;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

#[async_trait]
impl<R: JokeRepository + ?Sized> JokeRepository for Arc<R> {
    async fn get_random_joke(&self) -> RepositoryResult<Arc<Joke>> {
        (**self).get_random_joke().await
    }

    async fn get_random_jokes(&self, count: usize) -> RepositoryResult<Arc<JokeCollection>> {
        (**self).get_random_jokes(count).await
    }

    async fn get_joke_by_id(&self, joke_id: u32) -> RepositoryResult<Arc<Joke>> {
        (**self).get_joke_by_id(joke_id).await
    }

    async fn get_jokes_by_type(
        &self,
        joke_type: JokeType,
    ) -> RepositoryResult<Arc<JokeCollection>> {
        (**self).get_jokes_by_type(joke_type).await
    }

    async fn health_check(&self) -> bool {
        (**self).health_check().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Available repository implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    Http,
    Cached,
}

impl RepositoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryKind::Http => "http",
            RepositoryKind::Cached => "cached",
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(RepositoryKind::Http),
            "cached" => Ok(RepositoryKind::Cached),
            other => Err(format!(
                "invalid repository type: {}. Valid types are: [\"http\", \"cached\"]",
                other
            )),
        }
    }
}

/// A constructed repository plus the cache it may carry
pub struct BuiltRepository {
    /// Repository handed to the tool handlers
    pub repository: Arc<dyn JokeRepository>,

    /// Concrete cache, when `RepositoryKind::Cached` was requested
    pub cache: Option<Arc<CachedJokeRepository<HttpJokeRepository>>>,
}

/// Build the repository described by `config`
pub fn build_repository(config: &Config) -> BuiltRepository {
    let client = JokeApiClient::new(config.api_base_url.clone(), config.request_timeout);
    let http = HttpJokeRepository::new(client);

    match config.repository_kind {
        RepositoryKind::Http => {
            tracing::info!("Created {}", http.describe());
            BuiltRepository {
                repository: Arc::new(http),
                cache: None,
            }
        }
        RepositoryKind::Cached => {
            let cached = Arc::new(CachedJokeRepository::new(http, config.cache_ttl));
            tracing::info!("Created {}", cached.describe());
            BuiltRepository {
                repository: cached.clone(),
                cache: Some(cached),
            }
        }
    }
}
