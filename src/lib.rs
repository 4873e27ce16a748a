//! Jokes MCP Server Library
//!
//! A Model Context Protocol (MCP) server that serves jokes from a remote joke
//! API. Data access goes through a repository abstraction with an optional
//! TTL cache, and network transports are protected by a Bearer token.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod jokes;
pub mod logging;
pub mod mcp;
pub mod repository;
pub mod transport;

pub use config::Config;
pub use context::AppContext;
pub use error::{JokesMcpError, Result};
