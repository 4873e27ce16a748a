//! Transports exposing the MCP server
//!
//! `stdio` is the default. `http` and `sse` serve the same dispatcher over
//! axum and require a Bearer token on every tool call.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::context::AppContext;
use crate::error::{JokesMcpError, McpError, Result};

pub mod http;
pub mod sse;

/// How the server talks to its client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
    Sse,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Stdio => "stdio",
            Transport::Http => "http",
            Transport::Sse => "sse",
        }
    }

    /// Whether calls arrive as HTTP requests and must be authenticated
    pub fn is_network(&self) -> bool {
        !matches!(self, Transport::Stdio)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" | "streamable-http" => Ok(Transport::Http),
            "sse" => Ok(Transport::Sse),
            other => Err(format!(
                "invalid transport: {}. Valid transports are: [\"stdio\", \"http\", \"sse\"]",
                other
            )),
        }
    }
}

/// Resolve `host:port` for a network transport
///
/// The host must be an IP address or `localhost`; port 0 is rejected.
pub fn resolve_bind_address(host: &str, port: u16) -> Result<SocketAddr> {
    if port == 0 {
        return Err(transport_error(format!(
            "invalid port {}: must be between 1 and 65535",
            port
        )));
    }

    let ip = match host.trim() {
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .parse::<IpAddr>()
            .map_err(|_| transport_error(format!("invalid host: {:?}", host)))?,
    };

    Ok(SocketAddr::new(ip, port))
}

/// Bind a listener, mapping failures to a transport error
pub(crate) async fn bind(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| transport_error(format!("failed to bind {}: {}", addr, e)))
}

pub(crate) fn transport_error(message: impl Into<String>) -> JokesMcpError {
    JokesMcpError::Mcp(McpError::TransportError {
        message: message.into(),
    })
}

/// Resolves on Ctrl-C or SIGTERM
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Serve `context` on its configured transport until the client goes away
pub async fn run(context: &AppContext) -> Result<()> {
    let config = context.config();
    tracing::info!("Starting MCP server with {} transport", config.transport);

    match config.transport {
        Transport::Stdio => context.server().run_stdio().await,
        Transport::Http => {
            let addr = resolve_bind_address(&config.host, config.port)?;
            http::serve(context, addr).await
        }
        Transport::Sse => {
            let addr = resolve_bind_address(&config.host, config.port)?;
            sse::serve(context, addr).await
        }
    }
}
