//! libSQL backend — embedded `ConversationStore` implementation.
//!
//! Each conversation is one row whose `messages` column holds the JSON array
//! of messages, mirroring the document shape used by the MongoDB backend.
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::model::{Conversation, Message, conversation_id, now_rfc3339, parse_datetime};
use crate::store::traits::ConversationStore;

struct Handle {
    _db: LibSqlDatabase,
    conn: Connection,
}

/// libSQL conversation store.
///
/// Holds a single connection reused for all operations until `close()`.
pub struct LibSqlBackend {
    handle: Mutex<Option<Handle>>,
}

impl LibSqlBackend {
    /// Open `":memory:"` or a local database file.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        if path == ":memory:" {
            Self::new_memory().await
        } else {
            Self::new_local(Path::new(path)).await
        }
    }

    /// Open (or create) a local database file, migrate it and ensure indexes.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Conversation database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        let backend = Self {
            handle: Mutex::new(Some(Handle { _db: db, conn })),
        };
        backend.ensure_indexes().await?;
        Ok(backend)
    }

    /// Clone of the live connection, or `Closed` after `close()`.
    fn conn(&self) -> Result<Connection, DatabaseError> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| h.conn.clone())
            .ok_or(DatabaseError::Closed)
    }
}

fn parse_messages(json: &str) -> Result<Vec<Message>, DatabaseError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

fn row_to_conversation(row: &libsql::Row) -> Result<Conversation, DatabaseError> {
    let messages: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        thread_name: row.get(2)?,
        messages: parse_messages(&messages)?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

#[async_trait]
impl ConversationStore for LibSqlBackend {
    async fn ensure_indexes(&self) -> Result<(), DatabaseError> {
        self.conn()?
            .execute_batch(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_user_thread
                    ON conversations(user_id, thread_name);
                 CREATE INDEX IF NOT EXISTS idx_conversations_user
                    ON conversations(user_id);",
            )
            .await?;
        debug!("Conversation indexes ensured");
        Ok(())
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<Vec<Message>, DatabaseError> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT messages FROM conversations WHERE user_id = ?1 AND thread_name = ?2",
                params![user_id, thread_name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let messages: String = row.get(0)?;
                parse_messages(&messages)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn find_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT id, user_id, thread_name, messages, created_at, updated_at
                 FROM conversations WHERE user_id = ?1 AND thread_name = ?2",
                params![user_id, thread_name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row_to_conversation(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn save_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
        messages: &[Message],
    ) -> Result<(), DatabaseError> {
        let id = conversation_id(user_id, thread_name);
        let messages_json = serde_json::to_string(messages)?;
        let now = now_rfc3339();

        self.conn()?
            .execute(
                "INSERT INTO conversations (id, user_id, thread_name, messages, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (id) DO UPDATE SET
                    user_id = excluded.user_id,
                    thread_name = excluded.thread_name,
                    messages = excluded.messages,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at",
                params![id.as_str(), user_id, thread_name, messages_json, now],
            )
            .await?;

        debug!(
            user_id,
            thread_name,
            count = messages.len(),
            "Conversation saved"
        );
        Ok(())
    }

    async fn append_message(
        &self,
        user_id: &str,
        thread_name: &str,
        message: &Message,
    ) -> Result<(), DatabaseError> {
        let id = conversation_id(user_id, thread_name);
        let message_json = serde_json::to_string(message)?;
        let now = now_rfc3339();

        // One statement: insert-only columns live in VALUES, the DO UPDATE
        // branch only pushes the message and touches updated_at.
        self.conn()?
            .execute(
                "INSERT INTO conversations (id, user_id, thread_name, messages, created_at, updated_at)
                 VALUES (?1, ?2, ?3, json_array(json(?4)), ?5, ?5)
                 ON CONFLICT (id) DO UPDATE SET
                    messages = json_insert(conversations.messages, '$[#]', json(?4)),
                    updated_at = excluded.updated_at",
                params![id.as_str(), user_id, thread_name, message_json, now],
            )
            .await?;

        debug!(user_id, thread_name, "Message appended");
        Ok(())
    }

    async fn list_user_threads(&self, user_id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()?
            .query(
                "SELECT thread_name FROM conversations WHERE user_id = ?1",
                params![user_id],
            )
            .await?;

        let mut threads = Vec::new();
        while let Some(row) = rows.next().await? {
            threads.push(row.get::<String>(0)?);
        }
        Ok(threads)
    }

    async fn delete_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<bool, DatabaseError> {
        let id = conversation_id(user_id, thread_name);
        let deleted = self
            .conn()?
            .execute("DELETE FROM conversations WHERE id = ?1", params![id])
            .await?;

        debug!(user_id, thread_name, deleted, "Conversation delete");
        Ok(deleted > 0)
    }

    async fn wipe_all_conversations(&self) -> Result<u64, DatabaseError> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM conversations", ())
            .await?;

        info!(count = deleted, "Wiped all conversations");
        Ok(deleted)
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if handle.is_some() {
            info!("Conversation database closed");
        }
        Ok(())
    }
}
