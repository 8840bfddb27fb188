//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolCall, ToolSchema};

/// Overall deadline for one chat-completion request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for any endpoint speaking the OpenAI chat-completions protocol
/// with `tools` / `tool_calls` support.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
}

impl OpenAiChatClient {
    pub fn new(endpoint: String, api_key: String, model: String, temperature: f32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint,
            api_key,
            model,
            temperature,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChatResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            tools,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        parse_chat_response(&payload)
    }
}

/// Extract content and tool calls from a chat-completions response body.
fn parse_chat_response(payload: &Value) -> Result<ChatResponse, LlmError> {
    let message = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::MalformedResponse("no choices in response".to_string()))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());

    let tool_calls = match message.get("tool_calls") {
        Some(raw) if !raw.is_null() => Some(
            serde_json::from_value::<Vec<ToolCall>>(raw.clone())
                .map_err(|e| LlmError::MalformedResponse(format!("bad tool_calls: {}", e)))?,
        ),
        _ => None,
    };

    Ok(ChatResponse {
        content,
        tool_calls,
    })
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &s[..cut])
    }
}
