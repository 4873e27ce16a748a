//! Repository backed directly by the joke API

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{JokeApiError, RepositoryError};
use crate::jokes::types::{is_valid_joke_id, MAX_JOKE_ID, MIN_JOKE_ID};
use crate::jokes::{Joke, JokeApiClient, JokeCollection, JokeType};
use crate::repository::{JokeRepository, RepositoryResult};

/// Repository that forwards every call to the joke API
///
/// Client errors are translated into [`RepositoryError`]; an upstream 404 on a
/// lookup by id becomes `RepositoryError::NotFound`.
#[derive(Debug, Clone)]
pub struct HttpJokeRepository {
    client: JokeApiClient,
}

impl HttpJokeRepository {
    pub fn new(client: JokeApiClient) -> Self {
        tracing::info!(
            "HttpJokeRepository initialized with base_url: {}",
            client.base_url()
        );
        Self { client }
    }

    pub fn client(&self) -> &JokeApiClient {
        &self.client
    }
}

#[async_trait]
impl JokeRepository for HttpJokeRepository {
    async fn get_random_joke(&self) -> RepositoryResult<Arc<Joke>> {
        tracing::debug!("Fetching random joke from HTTP API");
        match self.client.get_joke().await {
            Ok(joke) => {
                tracing::debug!("Fetched joke ID: {}", joke.id);
                Ok(Arc::new(joke))
            }
            Err(e) => {
                tracing::error!("Failed to fetch random joke: {}", e);
                Err(RepositoryError::failed(
                    "Failed to retrieve random joke from repository",
                    e,
                ))
            }
        }
    }

    async fn get_random_jokes(&self, count: usize) -> RepositoryResult<Arc<JokeCollection>> {
        if count == 0 {
            return Err(RepositoryError::invalid(
                "Cannot retrieve zero random jokes; count must be at least 1",
            ));
        }

        // The upstream only offers a batch of ten
        tracing::debug!("Fetching {} random jokes from HTTP API", count);
        match self.client.get_ten_jokes().await {
            Ok(jokes) => {
                let jokes = jokes.truncated(count);
                tracing::debug!("Fetched {} jokes", jokes.len());
                Ok(Arc::new(jokes))
            }
            Err(e) => {
                tracing::error!("Failed to fetch random jokes: {}", e);
                Err(RepositoryError::failed(
                    format!("Failed to retrieve {} random jokes from repository", count),
                    e,
                ))
            }
        }
    }

    async fn get_joke_by_id(&self, joke_id: u32) -> RepositoryResult<Arc<Joke>> {
        if !is_valid_joke_id(joke_id) {
            tracing::warn!(
                "Joke ID {} outside {}-{}, not found",
                joke_id,
                MIN_JOKE_ID,
                MAX_JOKE_ID
            );
            return Err(RepositoryError::NotFound { joke_id });
        }

        tracing::debug!("Fetching joke by ID: {}", joke_id);
        match self.client.get_joke_by_id(joke_id).await {
            Ok(joke) => Ok(Arc::new(joke)),
            Err(JokeApiError::Http {
                status_code: 404, ..
            }) => {
                tracing::warn!("Joke with ID {} not found", joke_id);
                Err(RepositoryError::NotFound { joke_id })
            }
            Err(e) => {
                tracing::error!("Failed to fetch joke {}: {}", joke_id, e);
                Err(RepositoryError::failed(
                    format!("Failed to retrieve joke with ID {}", joke_id),
                    e,
                ))
            }
        }
    }

    async fn get_jokes_by_type(
        &self,
        joke_type: JokeType,
    ) -> RepositoryResult<Arc<JokeCollection>> {
        tracing::debug!("Fetching jokes of type: {}", joke_type);
        match self.client.get_jokes_by_type(joke_type).await {
            Ok(jokes) => {
                tracing::debug!("Fetched {} jokes of type {}", jokes.len(), joke_type);
                Ok(Arc::new(jokes))
            }
            Err(e) => {
                tracing::error!("Failed to fetch jokes of type {}: {}", joke_type, e);
                Err(RepositoryError::failed(
                    format!("Failed to retrieve jokes of type '{}' from repository", joke_type),
                    e,
                ))
            }
        }
    }

    async fn health_check(&self) -> bool {
        tracing::debug!("Performing health check on HTTP API");
        match self.client.get_joke().await {
            Ok(_) => {
                tracing::info!("Health check passed - HTTP API is accessible");
                true
            }
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("HttpJokeRepository(base_url={:?})", self.client.base_url())
    }
}
