//! Jokes MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server exposing joke tools over stdio,
//! streamable HTTP or SSE.

use clap::{Parser, Subcommand};

use jokes_mcp_server::config::Config;
use jokes_mcp_server::context::AppContext;
use jokes_mcp_server::error::Result;
use jokes_mcp_server::logging;
use jokes_mcp_server::repository::build_repository;
use jokes_mcp_server::transport::{self, Transport};

/// Jokes MCP Server
#[derive(Parser)]
#[command(name = "jokes-mcp-server")]
#[command(author, version, about = "Jokes MCP Server - A Model Context Protocol server for jokes")]
struct Cli {
    /// Transport to serve on (overrides PROTOCOL_MCP)
    #[arg(long)]
    transport: Option<Transport>,

    /// Bind host for network transports (overrides MCP_SERVER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port for network transports (overrides MCP_SERVER_PORT)
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the joke API is reachable, then exit
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(transport) = cli.transport {
        config.transport = transport;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    // Initialize logging; stdout belongs to the stdio transport
    let log_guards = logging::init(&config.logging)?;

    match cli.command {
        Some(Commands::Health) => {
            let built = build_repository(&config);
            let healthy = built.repository.health_check().await;
            eprintln!(
                "{}: {}",
                built.repository.describe(),
                if healthy { "healthy" } else { "unhealthy" }
            );
            // Flush the log writers before exiting
            drop(log_guards);
            std::process::exit(if healthy { 0 } else { 1 });
        }
        None => {
            config.validate()?;
            tracing::info!("{}", config.redacted());

            let context = AppContext::new(config);
            transport::run(&context).await?;
        }
    }

    Ok(())
}
