//! Server-Sent Events transport
//!
//! A client opens `GET /sse` and receives an `endpoint` event naming the URL
//! to post messages to. Each `POST /messages?session_id=..` is dispatched and
//! its response is pushed back on that session's stream as a `message` event.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::{FromRef, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::Result;
use crate::transport::http::{health_handler, HttpState};
use crate::transport::{bind, shutdown_signal, transport_error};

/// Pending messages per session before `POST /messages` waits
const CHANNEL_CAPACITY: usize = 100;

/// Open SSE sessions keyed by id
#[derive(Clone, Default)]
pub struct SessionMap {
    inner: Arc<RwLock<HashMap<Uuid, mpsc::Sender<String>>>>,
}

impl SessionMap {
    fn insert(&self, session_id: Uuid, tx: mpsc::Sender<String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id, tx);
    }

    fn get(&self, session_id: &Uuid) -> Option<mpsc::Sender<String>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn remove(&self, session_id: &Uuid) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes the session once its stream is dropped
struct SessionGuard {
    session_id: Uuid,
    sessions: SessionMap,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        tracing::info!(session_id = %self.session_id, "SSE session closed");
        self.sessions.remove(&self.session_id);
    }
}

/// State shared by the SSE handlers
#[derive(Clone)]
pub struct SseState {
    pub http: HttpState,
    pub sessions: SessionMap,
}

impl FromRef<SseState> for HttpState {
    fn from_ref(state: &SseState) -> Self {
        state.http.clone()
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Uuid,
}

/// Build the router for the SSE transport
pub fn router(state: SseState) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages", post(message_handler))
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve the SSE transport on `addr` until shutdown
pub async fn serve(context: &AppContext, addr: SocketAddr) -> Result<()> {
    let app = router(SseState {
        http: HttpState {
            server: context.server(),
            repository: context.repository(),
        },
        sessions: SessionMap::default(),
    });

    let listener = bind(addr).await?;
    tracing::info!(address = %addr, "SSE transport listening on /sse");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| transport_error(format!("SSE server error: {}", e)))
}

async fn sse_handler(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    state.sessions.insert(session_id, tx);
    tracing::info!(%session_id, "SSE session opened");

    let guard = SessionGuard {
        session_id,
        sessions: state.sessions.clone(),
    };

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={}", session_id));

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(endpoint);

        while let Some(message) = rx.recv().await {
            yield Ok(Event::default().event("message").data(message));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn message_handler(
    State(state): State<SseState>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let session_id = query.session_id;
    let Some(tx) = state.sessions.get(&session_id) else {
        tracing::warn!(%session_id, "Message for unknown SSE session");
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    };

    let Some(response) = state.http.server.handle_message(&body, Some(&headers)).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let payload = match serde_json::to_string(&response) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(%session_id, "Failed to serialize response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if tx.send(payload).await.is_err() {
        state.sessions.remove(&session_id);
        return (StatusCode::NOT_FOUND, "Session closed").into_response();
    }

    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthGate;
    use crate::mcp::server::McpServer;
    use crate::repository::testing::CountingRepository;
    use axum::body::{Body, Bytes};
    use axum::http::{header, Request};
    use futures_util::StreamExt;
    use tower::ServiceExt;

    fn app() -> (SessionMap, Router) {
        let repo = Arc::new(CountingRepository::new());
        let sessions = SessionMap::default();
        let state = SseState {
            http: HttpState {
                server: Arc::new(McpServer::new(
                    repo.clone(),
                    AuthGate::new(Some("abc123".to_string())),
                )),
                repository: repo,
            },
            sessions: sessions.clone(),
        };
        (sessions, router(state))
    }

    /// Read body frames until one full SSE event has arrived
    async fn next_event<S>(body: &mut S) -> String
    where
        S: Stream<Item = std::result::Result<Bytes, axum::Error>> + Unpin,
    {
        let mut buffer = String::new();
        while !buffer.contains("\n\n") {
            let chunk = body.next().await.unwrap().unwrap();
            buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        buffer
    }

    fn post_message(uri: &str, body: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (sessions, app) = app();

        let response = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sessions.len(), 1);

        let mut body = response.into_body().into_data_stream();
        let first = next_event(&mut body).await;
        assert!(first.contains("event: endpoint"));

        let endpoint = first
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap()
            .to_string();
        assert!(endpoint.starts_with("/messages?session_id="));

        let msg = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"get_joke"}}"#;
        let response = app
            .clone()
            .oneshot(post_message(&endpoint, msg, Some("Bearer abc123")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let pushed = next_event(&mut body).await;
        assert!(pushed.contains("event: message"));
        assert!(pushed.contains("Setup 1"));

        drop(body);
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_, app) = app();
        let uri = format!("/messages?session_id={}", Uuid::new_v4());
        let msg = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;

        let response = app.oneshot(post_message(&uri, msg, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
