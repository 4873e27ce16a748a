//! Integration tests for Jokes MCP Server
//!
//! These tests drive the public API end to end: the JSON-RPC dispatcher, the
//! HTTP router and the cached repository. The joke API is faked with wiremock,
//! so no real network calls leave the machine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jokes_mcp_server::auth::AuthGate;
use jokes_mcp_server::config::Config;
use jokes_mcp_server::context::AppContext;
use jokes_mcp_server::error::RepositoryError;
use jokes_mcp_server::jokes::{Joke, JokeCollection, JokeType};
use jokes_mcp_server::mcp::server::McpServer;
use jokes_mcp_server::repository::{CachedJokeRepository, JokeRepository, RepositoryResult};
use jokes_mcp_server::transport::http::{router, HttpState};

const TOKEN: &str = "integration-secret";

/// Helper to create a JSON-RPC request
fn make_request(id: i64, method: &str, params: Option<Value>) -> String {
    let mut request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(p) = params {
        request["params"] = p;
    }
    request.to_string()
}

fn call_tool(id: i64, name: &str, arguments: Value) -> String {
    make_request(
        id,
        "tools/call",
        Some(json!({"name": name, "arguments": arguments})),
    )
}

fn joke_json(id: u32) -> Value {
    json!({
        "type": "programming",
        "setup": format!("Why did joke {} cross the road?", id),
        "punchline": "To get to the other side",
        "id": id
    })
}

/// Fake repository with a call counter, for the dispatcher tests
struct FakeRepository {
    calls: AtomicUsize,
}

impl FakeRepository {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn joke(&self, id: u32) -> Joke {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Joke {
            joke_type: JokeType::Dad,
            setup: format!("Setup {}", id),
            punchline: format!("Punchline {}", id),
            id,
        }
    }
}

#[async_trait]
impl JokeRepository for FakeRepository {
    async fn get_random_joke(&self) -> RepositoryResult<Arc<Joke>> {
        Ok(Arc::new(self.joke(7)))
    }

    async fn get_random_jokes(&self, count: usize) -> RepositoryResult<Arc<JokeCollection>> {
        let jokes: Vec<Joke> = (1..=count as u32).map(|id| self.joke(id)).collect();
        Ok(Arc::new(jokes.into()))
    }

    async fn get_joke_by_id(&self, joke_id: u32) -> RepositoryResult<Arc<Joke>> {
        if joke_id == 404 {
            return Err(RepositoryError::NotFound { joke_id });
        }
        Ok(Arc::new(self.joke(joke_id)))
    }

    async fn get_jokes_by_type(&self, joke_type: JokeType) -> RepositoryResult<Arc<JokeCollection>> {
        let mut joke = self.joke(1);
        joke.joke_type = joke_type;
        Ok(Arc::new(vec![joke].into()))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "FakeRepository".to_string()
    }
}

async fn tool_text(server: &McpServer, message: &str) -> (bool, String) {
    let response = server.handle_message(message, None).await.unwrap();
    let result = response.result.expect("tool calls always succeed at the JSON-RPC level");
    (
        result["isError"].as_bool().unwrap_or(false),
        result["content"][0]["text"].as_str().unwrap().to_string(),
    )
}

mod mcp_protocol_tests {
    use super::*;

    fn server() -> (Arc<FakeRepository>, McpServer) {
        let repo = Arc::new(FakeRepository::new());
        let server = McpServer::new(repo.clone(), AuthGate::new(Some(TOKEN.to_string())));
        (repo, server)
    }

    #[tokio::test]
    async fn test_full_session() {
        let (repo, server) = server();

        let init = make_request(
            1,
            "initialize",
            Some(json!({
                "protocolVersion": "2024-11-05",
                "clientInfo": {"name": "test-client", "version": "1.0.0"},
                "capabilities": {}
            })),
        );
        let response = server.handle_message(&init, None).await.unwrap();
        assert_eq!(response.result.unwrap()["serverInfo"]["name"], "jokes");

        let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(server
            .handle_message(&initialized.to_string(), None)
            .await
            .is_none());
        assert!(server.is_initialized());

        let response = server
            .handle_message(&make_request(2, "tools/list", None), None)
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].clone();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"get_joke_by_type"));

        let (is_error, text) = tool_text(&server, &call_tool(3, "get_joke", json!({}))).await;
        assert!(!is_error);
        assert_eq!(text, "Setup 7\nPunchline 7");
        assert_eq!(repo.calls(), 1);
    }

    #[tokio::test]
    async fn test_consistent_joke_never_touches_repository() {
        let (repo, server) = server();
        for id in 0..3 {
            let (_, text) =
                tool_text(&server, &call_tool(id, "get_consistent_joke", json!({}))).await;
            assert_eq!(text, "What's brown and sticky?\nA stick! Ha ha ha ha");
        }
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_reported_as_tool_error() {
        let (_, server) = server();
        let (is_error, text) =
            tool_text(&server, &call_tool(4, "get_joke_by_id", json!({"joke_id": 404}))).await;
        assert!(is_error);
        assert!(text.contains("Joke with ID 404 not found"));
    }

    #[tokio::test]
    async fn test_get_joke_by_type() {
        let (_, server) = server();
        let (is_error, text) = tool_text(
            &server,
            &call_tool(5, "get_joke_by_type", json!({"joke_type": "knock-knock"})),
        )
        .await;
        assert!(!is_error);
        assert_eq!(text, "Setup 1\nPunchline 1");
    }
}

mod http_transport_tests {
    use super::*;

    fn app() -> (Arc<FakeRepository>, axum::Router) {
        let repo = Arc::new(FakeRepository::new());
        let server = Arc::new(McpServer::new(
            repo.clone(),
            AuthGate::new(Some(TOKEN.to_string())),
        ));
        let app = router(HttpState {
            server,
            repository: repo.clone(),
        });
        (repo, app)
    }

    fn post(body: String, auth: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn result_of(response: axum::response::Response) -> Value {
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        body["result"].clone()
    }

    #[tokio::test]
    async fn test_tool_call_requires_token() {
        let (repo, app) = app();

        let result = result_of(
            app.oneshot(post(call_tool(1, "get_joke", json!({})), None))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Authentication required"));
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn test_tool_call_rejects_basic_auth() {
        let (repo, app) = app();

        let result = result_of(
            app.oneshot(post(
                call_tool(1, "get_joke", json!({})),
                Some("Basic dXNlcjpwYXNz".to_string()),
            ))
            .await
            .unwrap(),
        )
        .await;

        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Invalid Authorization header format"));
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn test_tool_call_with_token() {
        let (repo, app) = app();

        let result = result_of(
            app.oneshot(post(
                call_tool(1, "get_joke_by_id", json!({"joke_id": 42})),
                Some(format!("bearer {}", TOKEN)),
            ))
            .await
            .unwrap(),
        )
        .await;

        assert!(result.get("isError").is_none());
        assert_eq!(result["content"][0]["text"], "Setup 42\nPunchline 42");
        assert_eq!(repo.calls(), 1);
    }

    #[tokio::test]
    async fn test_tools_list_without_token() {
        let (_, app) = app();
        let result = result_of(
            app.oneshot(post(make_request(1, "tools/list", None), None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(result["tools"].as_array().unwrap().len(), 4);
    }
}

mod end_to_end_tests {
    use super::*;

    fn config_for(server: &MockServer) -> Config {
        let base_url = server.uri();
        Config::from_lookup(move |var| match var {
            "API_BASE_URL" => Some(base_url.clone()),
            "LOCAL_TOKEN" => Some(TOKEN.to_string()),
            "PROTOCOL_MCP" => Some("http".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_cached_lookup_hits_upstream_once() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jokes/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(joke_json(12)))
            .expect(1)
            .mount(&upstream)
            .await;

        let config = config_for(&upstream);
        assert!(config.validate().is_ok());
        let context = AppContext::new(config);
        let server = context.server();

        for id in 0..3 {
            let (is_error, text) =
                tool_text(&server, &call_tool(id, "get_joke_by_id", json!({"joke_id": 12}))).await;
            assert!(!is_error);
            assert_eq!(text, "Why did joke 12 cross the road?\nTo get to the other side");
        }

        let stats = context.cache_stats().unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.cache_size, 1);
    }

    #[tokio::test]
    async fn test_upstream_outage_is_reported() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&upstream)
            .await;

        let context = AppContext::new(config_for(&upstream));
        let (is_error, text) =
            tool_text(&context.server(), &call_tool(1, "get_joke", json!({}))).await;
        assert!(is_error);
        assert!(text.contains("Failed to retrieve random joke"));

        let app = router(HttpState {
            server: context.server(),
            repository: context.repository(),
        });
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

mod cache_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let repo = Arc::new(FakeRepository::new());
        let cache = CachedJokeRepository::new(repo.clone(), Duration::from_secs(60));

        let first = cache.get_joke_by_id(3).await.unwrap();
        let second = cache.get_joke_by_id(3).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(repo.calls(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;

        let third = cache.get_joke_by_id(3).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(repo.calls(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_random_jokes_bypass_cache() {
        let repo = Arc::new(FakeRepository::new());
        let cache = CachedJokeRepository::new(repo.clone(), Duration::from_secs(60));

        cache.get_random_joke().await.unwrap();
        cache.get_random_joke().await.unwrap();
        assert_eq!(cache.get_random_jokes(2).await.unwrap().len(), 2);

        assert_eq!(repo.calls(), 4);
        assert_eq!(cache.stats().cache_size, 0);
        assert!(cache.describe().contains("FakeRepository"));
    }
}
