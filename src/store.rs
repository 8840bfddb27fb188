//! Conversation persistence on SQLite.
//!
//! A conversation owns an ordered, append-only sequence of messages.
//! Appends go through a single connection behind an async mutex, which
//! serializes writes and keeps per-conversation message order stable even
//! under concurrent API traffic. Deleting a conversation cascades to its
//! messages.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),
}

/// Author of a persisted message. Tool messages are transient run state and
/// are never persisted, so only these two roles reach the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// A conversation row.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted message. Immutable once created; ordering within a
/// conversation follows insertion order.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// SQLite-backed conversation store.
pub struct ConversationStore {
    conn: Mutex<Connection>,
}

impl ConversationStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS conversations (
                 id TEXT PRIMARY KEY,
                 title TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS messages (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 conversation_id TEXT NOT NULL
                     REFERENCES conversations(id) ON DELETE CASCADE,
                 role TEXT NOT NULL,
                 content TEXT NOT NULL,
                 timestamp TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_messages_conversation
                 ON messages(conversation_id);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new conversation with the given title.
    pub async fn create_conversation(&self, title: &str) -> Result<Conversation, StoreError> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            title: title.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation.id.to_string(),
                conversation.title,
                conversation.created_at.to_rfc3339(),
                conversation.updated_at.to_rfc3339(),
            ],
        )?;

        tracing::info!(conversation_id = %conversation.id, "Created conversation");
        Ok(conversation)
    }

    /// All conversations, most recently updated first.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at, updated_at FROM conversations
             ORDER BY updated_at DESC, id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut conversations = Vec::new();
        for row in rows {
            let (id, title, created_at, updated_at) = row?;
            conversations.push(Conversation {
                id: parse_uuid(&id)?,
                title,
                created_at: parse_timestamp(&created_at),
                updated_at: parse_timestamp(&updated_at),
            });
        }
        Ok(conversations)
    }

    /// Whether a conversation exists.
    pub async fn conversation_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All messages of a conversation in chronological order.
    pub async fn get_history(&self, id: Uuid) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, role, content, timestamp FROM messages
             WHERE conversation_id = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (message_id, role, content, timestamp) = row?;
            messages.push(StoredMessage {
                id: message_id,
                conversation_id: id,
                role: MessageRole::parse(&role),
                content,
                timestamp: parse_timestamp(&timestamp),
            });
        }
        Ok(messages)
    }

    /// Append a message and bump the conversation's `updated_at`.
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let timestamp = Utc::now();

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![timestamp.to_rfc3339(), conversation_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }

        tx.execute(
            "INSERT INTO messages (conversation_id, role, content, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation_id.to_string(),
                role.as_str(),
                content,
                timestamp.to_rfc3339(),
            ],
        )?;
        let message_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(StoredMessage {
            id: message_id,
            conversation_id,
            role,
            content: content.to_string(),
            timestamp,
        })
    }

    /// Delete a conversation and, via the FK cascade, all its messages.
    /// Returns false if the conversation did not exist.
    pub async fn delete_conversation(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![id.to_string()],
        )?;

        if deleted > 0 {
            tracing::info!(conversation_id = %id, "Deleted conversation");
        }
        Ok(deleted > 0)
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|_| {
        StoreError::Database(rusqlite::Error::InvalidColumnType(
            0,
            "uuid".to_string(),
            rusqlite::types::Type::Text,
        ))
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_list_conversations() {
        let store = ConversationStore::open_in_memory().unwrap();

        let first = store.create_conversation("First trip").await.unwrap();
        let second = store.create_conversation("Second trip").await.unwrap();

        // Appending bumps updated_at, floating that conversation to the top
        store
            .append_message(first.id, MessageRole::User, "hello")
            .await
            .unwrap();

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[tokio::test]
    async fn history_preserves_append_order() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conversation = store.create_conversation("Order").await.unwrap();

        store
            .append_message(conversation.id, MessageRole::User, "one")
            .await
            .unwrap();
        store
            .append_message(conversation.id, MessageRole::Assistant, "two")
            .await
            .unwrap();
        store
            .append_message(conversation.id, MessageRole::User, "three")
            .await
            .unwrap();

        let history = store.get_history(conversation.id).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn append_to_missing_conversation_fails() {
        let store = ConversationStore::open_in_memory().unwrap();
        let result = store
            .append_message(Uuid::new_v4(), MessageRole::User, "ghost")
            .await;
        assert!(matches!(result, Err(StoreError::ConversationNotFound(_))));
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conversation = store.create_conversation("Doomed").await.unwrap();
        store
            .append_message(conversation.id, MessageRole::User, "bye")
            .await
            .unwrap();

        assert!(store.delete_conversation(conversation.id).await.unwrap());
        assert!(!store.conversation_exists(conversation.id).await.unwrap());
        assert!(store.get_history(conversation.id).await.unwrap().is_empty());

        // Second delete reports missing
        assert!(!store.delete_conversation(conversation.id).await.unwrap());
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/conversations.db");

        let store = ConversationStore::open(&path).unwrap();
        store.create_conversation("Persisted").await.unwrap();

        assert!(path.exists());
    }
}
