//! The routing agent's decision loop.
//!
//! Each run: hand the windowed conversation plus the current query to the
//! reasoning capability, execute whatever tool calls it proposes (none, one,
//! or several), feed results back, and repeat until it produces final
//! answer text or the iteration cap forces best-effort synthesis. Tool
//! failures never abort a run; they become degradation notes the model is
//! asked to phrase around.

use std::sync::Arc;

use thiserror::Error;

use crate::llm::{ChatMessage, LlmClient, LlmError, ToolCall};
use crate::tools::{ToolError, ToolRegistry};

use super::prompt::build_system_prompt;
use super::state::{AgentState, RunOutcome, ToolOutcome};

/// Errors that surface to the caller. Everything else (tool trouble,
/// exhausted iterations) is absorbed into the answer text.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("empty user message")]
    EmptyQuery,

    /// The reasoning backend itself is unreachable or broken.
    #[error(transparent)]
    Reasoning(#[from] LlmError),

    /// The backend returned neither answer text nor tool calls.
    #[error("reasoning backend returned an empty response")]
    EmptyResponse,
}

/// The query-routing agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    max_iterations: usize,
    history_window: usize,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        max_iterations: usize,
        history_window: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            max_iterations,
            history_window,
        }
    }

    /// Run one query against the conversation history and return the final
    /// answer plus the tool trace.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::EmptyQuery` for blank input and
    /// `AgentError::Reasoning` if the reasoning backend fails. Tool
    /// failures do not error; they degrade into caveats in the answer.
    pub async fn run(
        &self,
        history: &[ChatMessage],
        query: &str,
    ) -> Result<RunOutcome, AgentError> {
        if query.trim().is_empty() {
            return Err(AgentError::EmptyQuery);
        }

        let system_prompt = build_system_prompt(&self.tools);
        let mut state = AgentState::new(system_prompt, history, query, self.history_window);
        let schemas = self.tools.schemas();

        for round in 0..self.max_iterations {
            tracing::debug!(round = round + 1, "Agent reasoning round");

            let response = self.llm.chat(&state.messages, Some(&schemas)).await?;

            if response.has_tool_calls() {
                let tool_calls = response.tool_calls.unwrap_or_default();
                state.messages.push(ChatMessage::assistant_tool_calls(
                    response.content,
                    tool_calls.clone(),
                ));

                // Proposed calls run sequentially; each result lands in the
                // state before the next reasoning step sees it.
                for call in &tool_calls {
                    let result = self.execute_tool_call(call, &mut state).await;
                    state
                        .messages
                        .push(ChatMessage::tool_result(call.id.clone(), result));
                }

                continue;
            }

            // No tool calls: this is the final answer.
            if let Some(content) = response.content.filter(|c| !c.trim().is_empty()) {
                return Ok(RunOutcome {
                    answer: content,
                    trace: state.trace,
                });
            }

            return Err(AgentError::EmptyResponse);
        }

        // Iteration cap hit. Force one synthesis pass with tool calling
        // disabled so the run still terminates with best-effort text.
        tracing::warn!(
            max_iterations = self.max_iterations,
            "Iteration cap reached, forcing synthesis from partial results"
        );
        let answer = self.synthesize_partial(&mut state).await;

        Ok(RunOutcome {
            answer,
            trace: state.trace,
        })
    }

    /// Execute one proposed tool call, recording success or a degradation
    /// note. The returned string is what gets fed back to the model.
    async fn execute_tool_call(&self, call: &ToolCall, state: &mut AgentState) -> String {
        let name = &call.function.name;

        let args: serde_json::Value = match serde_json::from_str(&call.function.arguments) {
            Ok(value) => value,
            Err(e) => {
                let note = degradation_note(name, &ToolError::InvalidArguments(e.to_string()));
                tracing::warn!(tool = %name, error = %e, "Unparseable tool arguments");
                state.record(name, serde_json::Value::Null, ToolOutcome::Degraded(note.clone()));
                return format!("[tool unavailable] {}", note);
            }
        };

        tracing::info!(tool = %name, args = %args, "Executing tool call");

        match self.tools.execute(name, args.clone()).await {
            Ok(output) => {
                state.record(name, args, ToolOutcome::Success(output.clone()));
                output
            }
            Err(error) => {
                let note = degradation_note(name, &error);
                tracing::warn!(tool = %name, error = %error, "Tool call failed");
                state.record(name, args, ToolOutcome::Degraded(note.clone()));
                format!("[tool unavailable] {}", note)
            }
        }
    }

    /// Final forced synthesis once the cap is hit: ask for an answer with
    /// tools disabled, fall back to stitching partial results locally if
    /// even that call fails.
    async fn synthesize_partial(&self, state: &mut AgentState) -> String {
        state.messages.push(ChatMessage::user(
            "Stop calling tools. Using only the tool results gathered so far, give the best \
             answer you can, and note anything you could not retrieve.",
        ));

        match self.llm.chat(&state.messages, None).await {
            Ok(response) => match response.content.filter(|c| !c.trim().is_empty()) {
                Some(content) => content,
                None => fallback_answer(state),
            },
            Err(e) => {
                tracing::error!(error = %e, "Forced synthesis failed, using local fallback");
                fallback_answer(state)
            }
        }
    }
}

/// Stitch a readable best-effort answer directly from partial results.
fn fallback_answer(state: &AgentState) -> String {
    let results = state.successful_results();
    if results.is_empty() {
        "I'm sorry, but I wasn't able to gather the information needed to answer that just now. \
         Please try again in a moment."
            .to_string()
    } else {
        format!(
            "I couldn't finish everything I set out to look up, but here is what I found:\n\n{}",
            results.join("\n\n")
        )
    }
}

/// User-presentable caveat standing in for a failed tool result.
fn degradation_note(tool_name: &str, error: &ToolError) -> String {
    match error {
        // Not-found messages already name what was missing
        ToolError::NotFound(message) => message.clone(),
        ToolError::Timeout => format!(
            "The {} lookup timed out. Mention that this part is unavailable right now.",
            tool_name
        ),
        ToolError::Service(_) | ToolError::InvalidArguments(_) => format!(
            "The {} lookup is unavailable right now. Answer with what you have and mention the gap.",
            tool_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, Role, ToolSchema};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted reasoning capability: pops canned responses in order while
    /// tools are offered; when tools are disabled (forced synthesis) it
    /// returns a fixed summary instead. Records every message list it sees.
    struct ScriptedLlm {
        script: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
        no_tools_reply: Option<String>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Result<ChatResponse, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                no_tools_reply: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn with_no_tools_reply(mut self, reply: &str) -> Self {
            self.no_tools_reply = Some(reply.to_string());
            self
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            tools: Option<&[ToolSchema]>,
        ) -> Result<ChatResponse, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());

            if tools.is_none() {
                if let Some(reply) = &self.no_tools_reply {
                    return Ok(ChatResponse {
                        content: Some(reply.clone()),
                        tool_calls: None,
                    });
                }
            }

            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(ChatResponse {
                        content: Some("(script exhausted)".to_string()),
                        tool_calls: None,
                    })
                })
        }
    }

    fn final_answer(text: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: Some(text.to_string()),
            tool_calls: None,
        })
    }

    fn propose_calls(calls: &[(&str, Value)]) -> Result<ChatResponse, LlmError> {
        let tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{}", i),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: args.to_string(),
                },
            })
            .collect();
        Ok(ChatResponse {
            content: None,
            tool_calls: Some(tool_calls),
        })
    }

    /// What a recording tool should do when called.
    enum CannedResult {
        Ok(String),
        ServiceError,
        NotFound(String),
    }

    struct RecordingTool {
        tool_name: &'static str,
        result: CannedResult,
        calls: Arc<Mutex<Vec<Value>>>,
    }

    impl RecordingTool {
        fn new(tool_name: &'static str, result: CannedResult) -> (Self, Arc<Mutex<Vec<Value>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    tool_name,
                    result,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            self.tool_name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            self.calls.lock().unwrap().push(args);
            match &self.result {
                CannedResult::Ok(output) => Ok(output.clone()),
                CannedResult::ServiceError => Err(ToolError::Service("boom".to_string())),
                CannedResult::NotFound(msg) => Err(ToolError::NotFound(msg.clone())),
            }
        }
    }

    struct Fixture {
        agent: Agent,
        book_calls: Arc<Mutex<Vec<Value>>>,
        weather_calls: Arc<Mutex<Vec<Value>>>,
    }

    fn fixture(
        llm: ScriptedLlm,
        book_result: CannedResult,
        weather_result: CannedResult,
    ) -> Fixture {
        let (book, book_calls) = RecordingTool::new("query_twain_book", book_result);
        let (weather, weather_calls) = RecordingTool::new("get_weather", weather_result);

        let mut tools = ToolRegistry::new(Duration::from_secs(5));
        tools.register(Arc::new(book));
        tools.register(Arc::new(weather));

        Fixture {
            agent: Agent::new(Arc::new(llm), tools, 3, 10),
            book_calls,
            weather_calls,
        }
    }

    fn passages() -> CannedResult {
        CannedResult::Ok("**[Chapter LVIII]** The Sphinx is grand in its loneliness".to_string())
    }

    fn tokyo_weather() -> CannedResult {
        CannedResult::Ok("Current weather in Tokyo, JP:\nTemperature: 28.0°C".to_string())
    }

    #[tokio::test]
    async fn weather_only_query_invokes_weather_tool_only() {
        let llm = ScriptedLlm::new(vec![
            propose_calls(&[("get_weather", json!({"location": "Tokyo"}))]),
            final_answer("### Weather in Tokyo\nTemperature: 28.0°C, clear skies."),
        ]);
        let f = fixture(llm, passages(), tokyo_weather());

        let outcome = f.agent.run(&[], "Weather in Tokyo?").await.unwrap();

        assert_eq!(f.weather_calls.lock().unwrap().len(), 1);
        assert!(f.book_calls.lock().unwrap().is_empty());
        assert!(outcome.answer.contains("Temperature"));
        assert_eq!(outcome.trace.len(), 1);
        assert!(outcome.trace[0].outcome.is_success());
    }

    #[tokio::test]
    async fn book_only_query_invokes_retriever_only() {
        let llm = ScriptedLlm::new(vec![
            propose_calls(&[(
                "query_twain_book",
                json!({"query": "What did Twain think about the Sphinx?"}),
            )]),
            final_answer("Twain found the Sphinx grand in its loneliness **[Chapter LVIII]**."),
        ]);
        let f = fixture(llm, passages(), tokyo_weather());

        let outcome = f
            .agent
            .run(&[], "What did Twain think about the Sphinx?")
            .await
            .unwrap();

        assert_eq!(f.book_calls.lock().unwrap().len(), 1);
        assert!(f.weather_calls.lock().unwrap().is_empty());
        assert!(outcome.answer.contains("Sphinx"));
        let recorded = &f.book_calls.lock().unwrap()[0];
        assert!(recorded["query"].as_str().unwrap().contains("Sphinx"));
    }

    #[tokio::test]
    async fn combined_query_invokes_both_tools_and_merges() {
        let llm = ScriptedLlm::new(vec![
            propose_calls(&[
                ("query_twain_book", json!({"query": "Twain in Athens"})),
                ("get_weather", json!({"location": "Athens"})),
            ]),
            final_answer(
                "### Twain in Athens\nThe Sphinx is grand in its loneliness\n\n\
                 ### Weather today\nTemperature: 28.0°C",
            ),
        ]);
        let f = fixture(llm, passages(), tokyo_weather());

        let outcome = f
            .agent
            .run(&[], "What did Twain say about Athens, and how's the weather there?")
            .await
            .unwrap();

        assert_eq!(f.book_calls.lock().unwrap().len(), 1);
        assert_eq!(f.weather_calls.lock().unwrap().len(), 1);
        assert_eq!(outcome.trace.len(), 2);
        // Both tool results appear in the synthesized answer
        assert!(outcome.answer.contains("loneliness"));
        assert!(outcome.answer.contains("Temperature"));
    }

    #[tokio::test]
    async fn out_of_domain_query_invokes_no_tools() {
        let llm = ScriptedLlm::new(vec![final_answer(
            "I specialize in Mark Twain's 'The Innocents Abroad' and current weather, so I \
             can't help with quantum physics.",
        )]);
        let f = fixture(llm, passages(), tokyo_weather());

        let outcome = f.agent.run(&[], "Explain quantum physics").await.unwrap();

        assert!(f.book_calls.lock().unwrap().is_empty());
        assert!(f.weather_calls.lock().unwrap().is_empty());
        assert!(outcome.trace.is_empty());
        assert!(outcome.answer.contains("specialize"));
    }

    #[tokio::test]
    async fn iteration_cap_forces_partial_synthesis() {
        // The script proposes tool calls on every round, well past the cap.
        let script = (0..10)
            .map(|_| propose_calls(&[("query_twain_book", json!({"query": "more"}))]))
            .collect();
        let llm =
            ScriptedLlm::new(script).with_no_tools_reply("Here is what I gathered so far.");
        let f = fixture(llm, passages(), tokyo_weather());

        let outcome = f.agent.run(&[], "Tell me everything").await.unwrap();

        // One call per round, bounded by max_iterations = 3
        assert_eq!(f.book_calls.lock().unwrap().len(), 3);
        assert_eq!(outcome.trace.len(), 3);
        assert_eq!(outcome.answer, "Here is what I gathered so far.");
    }

    #[tokio::test]
    async fn failed_tool_degrades_instead_of_crashing() {
        let llm = ScriptedLlm::new(vec![
            propose_calls(&[("get_weather", json!({"location": "Atlantis"}))]),
            final_answer("I couldn't find weather for Atlantis, sorry."),
        ]);
        let f = fixture(
            llm,
            passages(),
            CannedResult::NotFound("I couldn't find the location 'Atlantis'.".to_string()),
        );

        let outcome = f.agent.run(&[], "Weather in Atlantis?").await.unwrap();

        assert_eq!(outcome.trace.len(), 1);
        match &outcome.trace[0].outcome {
            ToolOutcome::Degraded(note) => assert!(note.contains("Atlantis")),
            other => panic!("expected degraded outcome, got {:?}", other),
        }
        assert!(outcome.answer.contains("Atlantis"));
    }

    #[tokio::test]
    async fn total_tool_failure_still_yields_an_answer() {
        let llm = ScriptedLlm::new(vec![
            propose_calls(&[
                ("query_twain_book", json!({"query": "Rome"})),
                ("get_weather", json!({"location": "Rome"})),
            ]),
            final_answer("Both of my sources are unavailable right now; please try again soon."),
        ]);
        let f = fixture(llm, CannedResult::ServiceError, CannedResult::ServiceError);

        let outcome = f.agent.run(&[], "Twain on Rome and its weather").await.unwrap();

        assert_eq!(outcome.trace.len(), 2);
        assert!(outcome.trace.iter().all(|inv| !inv.outcome.is_success()));
        assert!(!outcome.answer.is_empty());
    }

    #[tokio::test]
    async fn unparseable_tool_arguments_degrade() {
        let llm = ScriptedLlm::new(vec![
            Ok(ChatResponse {
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_0".to_string(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: "get_weather".to_string(),
                        arguments: "not json at all".to_string(),
                    },
                }]),
            }),
            final_answer("done"),
        ]);
        let f = fixture(llm, passages(), tokyo_weather());

        let outcome = f.agent.run(&[], "weather please").await.unwrap();

        // The tool itself never ran; the bad call was degraded
        assert!(f.weather_calls.lock().unwrap().is_empty());
        assert_eq!(outcome.trace.len(), 1);
        assert!(!outcome.trace[0].outcome.is_success());
    }

    #[tokio::test]
    async fn reasoning_failure_is_fatal_and_typed() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::Api {
            status: 503,
            message: "down".to_string(),
        })]);
        let f = fixture(llm, passages(), tokyo_weather());

        let result = f.agent.run(&[], "Weather in Tokyo?").await;
        assert!(matches!(result, Err(AgentError::Reasoning(_))));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let llm = ScriptedLlm::new(vec![]);
        let f = fixture(llm, passages(), tokyo_weather());

        assert!(matches!(
            f.agent.run(&[], "   ").await,
            Err(AgentError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn history_is_windowed_not_mutated() {
        let llm = ScriptedLlm::new(vec![final_answer("ok")]);
        let seen_handle;
        let agent = {
            let (book, _) = RecordingTool::new("query_twain_book", passages());
            let mut tools = ToolRegistry::new(Duration::from_secs(5));
            tools.register(Arc::new(book));

            let llm = Arc::new(llm);
            seen_handle = llm.clone();
            Agent::new(llm, tools, 3, 2)
        };

        let history: Vec<ChatMessage> = (0..6)
            .map(|i| ChatMessage::user(format!("old message {}", i)))
            .collect();

        agent.run(&history, "latest question").await.unwrap();

        let seen = seen_handle.seen.lock().unwrap();
        let first_call = &seen[0];
        // system + 2 windowed history + current query
        assert_eq!(first_call.len(), 4);
        assert_eq!(first_call[0].role, Role::System);
        assert_eq!(first_call[1].content.as_deref(), Some("old message 4"));
        assert_eq!(first_call[2].content.as_deref(), Some("old message 5"));
        assert_eq!(first_call[3].content.as_deref(), Some("latest question"));
        // Original history untouched
        assert_eq!(history.len(), 6);
    }
}
