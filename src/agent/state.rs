//! Working memory for a single agent run.
//!
//! A run's state is created fresh for each incoming user message and
//! discarded afterwards; only the final assistant message outlives it (the
//! caller persists that). The tool trace is returned alongside the answer
//! for logging, never stored.

use serde::Serialize;
use serde_json::Value;

use crate::llm::ChatMessage;

/// Record of one tool call made during a run.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    /// Argument object as proposed by the reasoning capability
    pub input: Value,
    pub outcome: ToolOutcome,
}

/// What a tool call produced: its output, or the degradation note that
/// stands in for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "text")]
pub enum ToolOutcome {
    Success(String),
    Degraded(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }
}

/// The result of one agent run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Final answer text (may carry markdown markers for the formatter)
    pub answer: String,
    /// Every tool call performed, in execution order
    pub trace: Vec<ToolInvocation>,
}

/// Per-run working memory: the message window handed to the reasoning
/// capability plus the accumulated tool trace.
pub(super) struct AgentState {
    pub messages: Vec<ChatMessage>,
    pub trace: Vec<ToolInvocation>,
}

impl AgentState {
    /// Snapshot the most recent `window` history messages behind the system
    /// prompt and current query. Stored history is never mutated; this is a
    /// read-only view bounded against context growth.
    pub fn new(
        system_prompt: String,
        history: &[ChatMessage],
        query: &str,
        window: usize,
    ) -> Self {
        let start = history.len().saturating_sub(window);

        let mut messages = Vec::with_capacity(history.len() - start + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend_from_slice(&history[start..]);
        messages.push(ChatMessage::user(query));

        Self {
            messages,
            trace: Vec::new(),
        }
    }

    pub fn record(&mut self, tool_name: &str, input: Value, outcome: ToolOutcome) {
        self.trace.push(ToolInvocation {
            tool_name: tool_name.to_string(),
            input,
            outcome,
        });
    }

    /// Successful tool outputs, for best-effort fallback synthesis.
    pub fn successful_results(&self) -> Vec<&str> {
        self.trace
            .iter()
            .filter_map(|inv| match &inv.outcome {
                ToolOutcome::Success(text) => Some(text.as_str()),
                ToolOutcome::Degraded(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn history(n: usize) -> Vec<ChatMessage> {
        (0..n).map(|i| ChatMessage::user(format!("m{}", i))).collect()
    }

    #[test]
    fn window_keeps_most_recent_messages() {
        let state = AgentState::new("sys".to_string(), &history(5), "now", 2);

        // system + 2 windowed + current query
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.messages[0].role, Role::System);
        assert_eq!(state.messages[1].content.as_deref(), Some("m3"));
        assert_eq!(state.messages[2].content.as_deref(), Some("m4"));
        assert_eq!(state.messages[3].content.as_deref(), Some("now"));
    }

    #[test]
    fn short_history_is_kept_whole() {
        let state = AgentState::new("sys".to_string(), &history(2), "now", 10);
        assert_eq!(state.messages.len(), 4);
    }

    #[test]
    fn successful_results_skip_degraded() {
        let mut state = AgentState::new("sys".to_string(), &[], "q", 10);
        state.record(
            "a",
            Value::Null,
            ToolOutcome::Success("good".to_string()),
        );
        state.record(
            "b",
            Value::Null,
            ToolOutcome::Degraded("note".to_string()),
        );

        assert_eq!(state.successful_results(), vec!["good"]);
        assert!(state.trace[1].outcome.is_success() == false);
    }
}
