//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Conversation, MessageRole, StoredMessage};

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "Travel Advisor AI";

// Error codes surfaced in error bodies.
pub const ERROR_NO_MESSAGE: &str = "NO_MESSAGE_PROVIDED";
pub const ERROR_INVALID_CONVERSATION_ID: &str = "INVALID_CONVERSATION_ID";
pub const ERROR_CONVERSATION_NOT_FOUND: &str = "CONVERSATION_NOT_FOUND";
pub const ERROR_DATABASE_ERROR: &str = "DATABASE_ERROR";
pub const ERROR_AGENT_ERROR: &str = "AGENT_ERROR";

/// Canned reply persisted when the reasoning backend fails outright.
pub const AGENT_ERROR_RESPONSE: &str =
    "I apologize, but I encountered an error while processing your request. Please try again.";

/// Conversation titles are derived from the first message, capped here.
pub const CONVERSATION_TITLE_LENGTH: usize = 35;

/// Request to send a message into a conversation.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// The user's message text
    pub message: Option<String>,

    /// Existing conversation id, or absent/"new" to start one
    pub conversation_id: Option<String>,
}

/// Response carrying the agent's formatted answer.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub response: String,
    pub conversation_id: Uuid,
}

/// Conversation summary for listings.
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationSummary {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id,
            title: conversation.title,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

/// One message in a conversation history response.
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<StoredMessage> for MessageView {
    fn from(message: StoredMessage) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Error body matching the `{error, message}` convention.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}
