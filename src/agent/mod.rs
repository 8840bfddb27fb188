//! Agent module - the query-routing core.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with the system prompt, recent history, and the query
//! 2. Call the reasoning capability with the available tool schemas
//! 3. Execute proposed tool calls and feed results (or degradation notes) back
//! 4. Repeat until final answer text or the iteration cap forces synthesis

mod agent_loop;
mod prompt;
mod state;

pub use agent_loop::{Agent, AgentError};
pub use prompt::build_system_prompt;
pub use state::{RunOutcome, ToolInvocation, ToolOutcome};
