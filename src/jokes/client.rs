//! Joke API client
//!
//! Thin GET wrapper over the joke API. Every endpoint goes through
//! [`JokeApiClient::fetch`], which owns the error translation.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::joke_api::{DEFAULT_TIMEOUT_SECS, RANDOM_JOKE_PATH, RANDOM_TEN_PATH};
use crate::error::JokeApiError;
use crate::jokes::types::{Joke, JokeCollection, JokeType};

/// Joke API client
#[derive(Debug, Clone)]
pub struct JokeApiClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// Base URL without trailing slash
    base_url: String,

    /// Per-request timeout
    timeout: Duration,
}

impl JokeApiClient {
    /// Create a new client for `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            http_client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    /// Create a client with the default timeout
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::new(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch a random joke
    pub async fn get_joke(&self) -> Result<Joke, JokeApiError> {
        self.fetch(RANDOM_JOKE_PATH).await
    }

    /// Fetch ten random jokes
    pub async fn get_ten_jokes(&self) -> Result<JokeCollection, JokeApiError> {
        self.fetch(RANDOM_TEN_PATH).await
    }

    /// Fetch a joke by id
    pub async fn get_joke_by_id(&self, joke_id: u32) -> Result<Joke, JokeApiError> {
        self.fetch(&format!("/jokes/{}", joke_id)).await
    }

    /// Fetch random jokes of one category
    pub async fn get_jokes_by_type(
        &self,
        joke_type: JokeType,
    ) -> Result<JokeCollection, JokeApiError> {
        let jokes: JokeCollection = self
            .fetch(&format!("/jokes/{}/random", joke_type))
            .await?;

        if jokes.is_empty() {
            return Err(JokeApiError::Parse {
                message: format!("no jokes returned for type '{}'", joke_type),
            });
        }

        Ok(jokes)
    }

    /// GET `endpoint` and decode the JSON body as `T`
    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, JokeApiError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http_client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, e))?;

        if status != reqwest::StatusCode::OK {
            tracing::error!("Error {} fetching {}: {}", status.as_u16(), url, body);
            return Err(JokeApiError::Http {
                status_code: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse response from {}: {}", url, e);
            JokeApiError::Parse {
                message: e.to_string(),
            }
        })
    }
}

/// Translate a reqwest failure into the client error taxonomy
fn transport_error(url: &str, err: reqwest::Error) -> JokeApiError {
    if err.is_timeout() {
        tracing::error!("Timed out calling {}: {}", url, err);
        JokeApiError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        tracing::error!("Connection error calling {}: {}", url, err);
        JokeApiError::Connection {
            message: err.to_string(),
        }
    } else {
        tracing::error!("Unexpected HTTP error calling {}: {}", url, err);
        JokeApiError::Connection {
            message: format!("unexpected HTTP error: {}", err),
        }
    }
}
