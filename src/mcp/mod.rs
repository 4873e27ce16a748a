//! MCP (Model Context Protocol) module
//!
//! JSON-RPC dispatcher, protocol types and the joke tools.

pub mod server;
pub mod tools;
pub mod types;
