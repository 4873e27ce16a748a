//! MCP Tool definitions and handlers
//!
//! Each tool asks the repository for jokes and renders them as
//! `"{setup}\n{punchline}"`.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::CallContext;
use crate::error::{JokesMcpError, McpError, RepositoryError, Result};
use crate::jokes::{Joke, JokeType};
use crate::mcp::types::Tool;
use crate::repository::JokeRepository;

/// Returned by `get_consistent_joke`, always the same
pub const CONSISTENT_JOKE: &str = "What's brown and sticky?\nA stick! Ha ha ha ha";

/// Tool names
pub mod names {
    pub const GET_CONSISTENT_JOKE: &str = "get_consistent_joke";
    pub const GET_JOKE: &str = "get_joke";
    pub const GET_JOKE_BY_ID: &str = "get_joke_by_id";
    pub const GET_JOKE_BY_TYPE: &str = "get_joke_by_type";
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
struct JokeByIdArgs {
    /// The unique identifier of the joke (1-451)
    #[validate(range(min = 1, max = 451))]
    joke_id: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct JokeByTypeArgs {
    /// Type of joke to fetch
    joke_type: JokeType,
}

/// Tool handler
pub struct ToolHandler {
    repository: Arc<dyn JokeRepository>,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(repository: Arc<dyn JokeRepository>) -> Self {
        Self { repository }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def::<NoArgs>(
                names::GET_CONSISTENT_JOKE,
                "Returns the same predefined joke on every call",
            ),
            tool_def::<NoArgs>(names::GET_JOKE, "Fetches a random joke"),
            tool_def::<JokeByIdArgs>(names::GET_JOKE_BY_ID, "Retrieves a joke by its ID (1-451)"),
            tool_def::<JokeByTypeArgs>(
                names::GET_JOKE_BY_TYPE,
                "Fetches a joke of the given type (general, knock-knock, programming, dad)",
            ),
        ]
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value, context: CallContext) -> Result<String> {
        tracing::debug!(
            authenticated = context.authenticated,
            auth_type = context.auth_type.unwrap_or("none"),
            "Invoking tool {}",
            name
        );

        match name {
            names::GET_CONSISTENT_JOKE => Ok(CONSISTENT_JOKE.to_string()),
            names::GET_JOKE => self.handle_get_joke().await,
            names::GET_JOKE_BY_ID => self.handle_get_joke_by_id(args).await,
            names::GET_JOKE_BY_TYPE => self.handle_get_joke_by_type(args).await,
            _ => Err(McpError::UnknownTool {
                name: name.to_string(),
            }
            .into()),
        }
    }

    // ==================== Tool Handlers ====================

    async fn handle_get_joke(&self) -> Result<String> {
        let joke = self.repository.get_random_joke().await?;
        Ok(format_joke(&joke))
    }

    async fn handle_get_joke_by_id(&self, args: Value) -> Result<String> {
        let args: JokeByIdArgs = parse_args(args)?;
        args.validate().map_err(|e| McpError::InvalidArguments {
            message: e.to_string(),
        })?;

        let joke = self.repository.get_joke_by_id(args.joke_id).await?;
        Ok(format_joke(&joke))
    }

    async fn handle_get_joke_by_type(&self, args: Value) -> Result<String> {
        let args: JokeByTypeArgs = parse_args(args)?;

        let jokes = self.repository.get_jokes_by_type(args.joke_type).await?;
        let joke = jokes.first().ok_or_else(|| {
            RepositoryError::invalid(format!("No jokes of type '{}' available", args.joke_type))
        })?;
        Ok(format_joke(joke))
    }
}

/// Render a joke as setup and punchline on two lines
pub fn format_joke(joke: &Joke) -> String {
    format!("{}\n{}", joke.setup, joke.punchline)
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    // Clients may omit `arguments` entirely
    let args = if args.is_null() { json!({}) } else { args };

    serde_json::from_value(args).map_err(|e| {
        JokesMcpError::Mcp(McpError::InvalidArguments {
            message: e.to_string(),
        })
    })
}

fn tool_def<T: JsonSchema>(name: &str, description: &str) -> Tool {
    let schema = schemars::schema_for!(T);
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: serde_json::to_value(schema)
            .unwrap_or_else(|_| json!({"type": "object", "properties": {}})),
    }
}
