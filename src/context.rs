//! Process-wide wiring
//!
//! Built once at startup and handed to the transports: configuration, the
//! repository, the auth gate and the MCP dispatcher that uses them.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::auth::AuthGate;
use crate::config::Config;
use crate::mcp::server::McpServer;
use crate::repository::{
    build_repository, spawn_sweeper, CacheStats, CachedJokeRepository, HttpJokeRepository,
    JokeRepository,
};

/// Shared application state
pub struct AppContext {
    config: Config,
    repository: Arc<dyn JokeRepository>,
    cache: Option<Arc<CachedJokeRepository<HttpJokeRepository>>>,
    server: Arc<McpServer>,
    sweeper: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Wire up everything `config` describes
    ///
    /// Starts the cache sweeper when the cached repository is selected, so
    /// this must run inside a tokio runtime.
    pub fn new(config: Config) -> Self {
        let built = build_repository(&config);
        let auth = AuthGate::new(config.local_token.clone());
        let server = Arc::new(McpServer::new(built.repository.clone(), auth));

        let sweeper = built
            .cache
            .as_ref()
            .map(|cache| spawn_sweeper(cache.clone(), config.cache_sweep_interval));

        Self {
            config,
            repository: built.repository,
            cache: built.cache,
            server,
            sweeper,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> Arc<dyn JokeRepository> {
        self.repository.clone()
    }

    pub fn server(&self) -> Arc<McpServer> {
        self.server.clone()
    }

    /// Cache counters, when the cached repository is in use
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        if let Some(stats) = self.cache_stats() {
            tracing::info!(
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                "Cache statistics at shutdown"
            );
        }
    }
}
