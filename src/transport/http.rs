//! Streamable HTTP transport
//!
//! `POST /mcp` takes one JSON-RPC message per request. Notifications are
//! acknowledged with `202 Accepted` and an empty body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::error::Result;
use crate::mcp::server::McpServer;
use crate::repository::JokeRepository;
use crate::transport::{bind, shutdown_signal, transport_error};

/// State shared by the HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub server: Arc<McpServer>,
    pub repository: Arc<dyn JokeRepository>,
}

/// Build the router for the HTTP transport
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve the HTTP transport on `addr` until shutdown
pub async fn serve(context: &AppContext, addr: SocketAddr) -> Result<()> {
    let app = router(HttpState {
        server: context.server(),
        repository: context.repository(),
    });

    let listener = bind(addr).await?;
    tracing::info!(address = %addr, "HTTP transport listening on /mcp");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| transport_error(format!("HTTP server error: {}", e)))
}

async fn mcp_handler(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    match state.server.handle_message(&body, Some(&headers)).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Shared by the HTTP and SSE routers
pub(crate) async fn health_handler(State(state): State<HttpState>) -> Response {
    let healthy = state.repository.health_check().await;
    let (status, label) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "repository": state.repository.describe(),
        })),
    )
        .into_response()
}
