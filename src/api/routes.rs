//! Chat API handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::agent::{Agent, AgentError};
use crate::format;
use crate::store::{ConversationStore, MessageRole, StoredMessage};
use crate::llm::ChatMessage;

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub store: ConversationStore,
    pub agent: Agent,
    pub run_locks: RunLocks,
}

/// Per-conversation run serialization: a message for a conversation is not
/// processed until the previous run for that conversation has completed.
/// Runs for different conversations proceed concurrently.
#[derive(Default)]
pub struct RunLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RunLocks {
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn forget(&self, id: Uuid) {
        self.locks.lock().await.remove(&id);
    }
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error,
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

/// Derive a conversation title from its opening message.
pub fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() <= CONVERSATION_TITLE_LENGTH {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(CONVERSATION_TITLE_LENGTH).collect();
        format!("{}...", head.trim_end())
    }
}

/// Map persisted history into the chat shape the agent consumes.
fn to_chat_messages(history: &[StoredMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|message| match message.role {
            MessageRole::User => ChatMessage::user(message.content.clone()),
            MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
        })
        .collect()
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /chat/message
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendMessageRequest>,
) -> Response {
    // Caller-level validation: an empty message never reaches the agent
    let message = match request.message.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ERROR_NO_MESSAGE,
                "No message provided in request",
            )
        }
    };

    // Resolve the target conversation, creating one for "new"/absent ids
    let conversation_id = match request.conversation_id.as_deref() {
        None | Some("") | Some("new") => {
            match state.store.create_conversation(&derive_title(&message)).await {
                Ok(conversation) => conversation.id,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create conversation");
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ERROR_DATABASE_ERROR,
                        "Failed to create conversation",
                    );
                }
            }
        }
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => id,
            Err(_) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    ERROR_INVALID_CONVERSATION_ID,
                    "Invalid conversation ID format",
                )
            }
        },
    };

    // Serialize runs per conversation; concurrent conversations proceed
    let _run_guard = state.run_locks.acquire(conversation_id).await;

    // Snapshot history before the new user message is appended
    let history = match state.store.get_history(conversation_id).await {
        Ok(history) => history,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load history");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ERROR_DATABASE_ERROR,
                "Failed to retrieve messages",
            );
        }
    };

    if let Err(e) = state
        .store
        .append_message(conversation_id, MessageRole::User, &message)
        .await
    {
        tracing::error!(error = %e, "Failed to persist user message");
        return error_response(
            StatusCode::NOT_FOUND,
            ERROR_CONVERSATION_NOT_FOUND,
            "Conversation not found",
        );
    }

    let chat_history = to_chat_messages(&history);
    let answer = match state.agent.run(&chat_history, &message).await {
        Ok(outcome) => {
            for invocation in &outcome.trace {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    tool = %invocation.tool_name,
                    success = invocation.outcome.is_success(),
                    "Tool invocation"
                );
            }
            format::render_markdown(&outcome.answer)
        }
        Err(AgentError::EmptyQuery) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ERROR_NO_MESSAGE,
                "No message provided in request",
            )
        }
        Err(e) => {
            // Reasoning backend failure: reply with the canned apology so the
            // conversation stays coherent, and log the real cause
            tracing::error!(conversation_id = %conversation_id, error = %e, "Agent run failed");
            AGENT_ERROR_RESPONSE.to_string()
        }
    };

    if let Err(e) = state
        .store
        .append_message(conversation_id, MessageRole::Assistant, &answer)
        .await
    {
        tracing::error!(error = %e, "Failed to persist assistant message");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ERROR_DATABASE_ERROR,
            "Database operation failed",
        );
    }

    Json(SendMessageResponse {
        response: answer,
        conversation_id,
    })
    .into_response()
}

/// GET /chat/conversations
pub async fn list_conversations(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list_conversations().await {
        Ok(conversations) => {
            let summaries: Vec<ConversationSummary> = conversations
                .into_iter()
                .map(ConversationSummary::from)
                .collect();
            Json(summaries).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list conversations");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ERROR_DATABASE_ERROR,
                "Failed to retrieve conversations",
            )
        }
    }
}

/// GET /chat/conversations/{id}
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ERROR_INVALID_CONVERSATION_ID,
            "Invalid conversation ID format",
        );
    };

    match state.store.conversation_exists(id).await {
        Ok(false) => {
            return error_response(
                StatusCode::NOT_FOUND,
                ERROR_CONVERSATION_NOT_FOUND,
                "Conversation not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to check conversation");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ERROR_DATABASE_ERROR,
                "Database operation failed",
            );
        }
        Ok(true) => {}
    }

    match state.store.get_history(id).await {
        Ok(messages) => {
            let views: Vec<MessageView> = messages.into_iter().map(MessageView::from).collect();
            Json(views).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load history");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ERROR_DATABASE_ERROR,
                "Failed to retrieve messages",
            )
        }
    }
}

/// DELETE /chat/conversations/{id}
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ERROR_INVALID_CONVERSATION_ID,
            "Invalid conversation ID format",
        );
    };

    match state.store.delete_conversation(id).await {
        Ok(true) => {
            state.run_locks.forget(id).await;
            Json(serde_json::json!({
                "message": "Conversation deleted successfully"
            }))
            .into_response()
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            ERROR_CONVERSATION_NOT_FOUND,
            "Conversation not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete conversation");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ERROR_DATABASE_ERROR,
                "Failed to delete conversation",
            )
        }
    }
}
