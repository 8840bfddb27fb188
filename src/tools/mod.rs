//! Tools the routing agent can invoke.
//!
//! Each tool advertises a JSON-schema parameter description that is handed
//! to the reasoning capability; the registry executes proposed calls under
//! a per-call deadline. Tool failures are typed so the agent can substitute
//! an accurate degradation note instead of crashing the run.

mod book;
mod weather;

pub use book::{ExtractLocations, QueryBook};
pub use weather::GetWeather;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolSchema;

/// How a tool call can fail. The variants mirror the degradation phrasing
/// the agent uses: a timeout and an upstream outage read differently from
/// "no such place".
#[derive(Debug, Error)]
pub enum ToolError {
    /// The call exceeded its deadline.
    #[error("tool call timed out")]
    Timeout,

    /// The requested thing does not exist (e.g. unresolvable place name).
    /// The message is user-presentable and names what was not found.
    #[error("{0}")]
    NotFound(String),

    /// Upstream service failure: auth, rate limit, 5xx, garbled payload.
    #[error("tool failed: {0}")]
    Service(String),

    /// The model proposed arguments that don't match the schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// An external capability the agent can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as advertised to the reasoning capability.
    fn name(&self) -> &str;

    /// One-paragraph description steering when the model should call this.
    fn description(&self) -> &str;

    /// JSON schema for the argument object.
    fn parameters_schema(&self) -> Value;

    /// Execute with already-parsed arguments.
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// Registry of available tools with a shared per-call deadline.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    call_timeout: Duration,
}

impl ToolRegistry {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            tools: Vec::new(),
            call_timeout,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Chat-completions descriptors for every registered tool.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| {
                ToolSchema::function(
                    t.name().to_string(),
                    t.description().to_string(),
                    t.parameters_schema(),
                )
            })
            .collect()
    }

    /// Name/description pairs for prompt construction.
    pub fn summaries(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a named tool under the registry's deadline.
    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("unknown tool: {}", name)))?;

        match tokio::time::timeout(self.call_timeout, tool.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout),
        }
    }
}

/// Extract a required string argument from a tool-call argument object.
pub(crate) fn required_str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{}' argument", key)))
}
