//! `ConversationStore` trait — single async interface for conversation persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::store::model::{Conversation, Message};

/// Backend-agnostic conversation repository.
///
/// One document per (user id, thread name). Reads of a missing conversation
/// return empty results, never an error.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create the unique (user_id, thread_name) index and the user_id index.
    /// Idempotent; backends call it once when they are opened.
    async fn ensure_indexes(&self) -> Result<(), DatabaseError>;

    /// Messages of a conversation, in order. Empty if it does not exist.
    async fn get_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<Vec<Message>, DatabaseError>;

    /// Full conversation record, including timestamps.
    async fn find_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<Option<Conversation>, DatabaseError>;

    /// Replace (or create) the whole conversation.
    ///
    /// Both `created_at` and `updated_at` are set to now, even when the
    /// conversation already existed.
    async fn save_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
        messages: &[Message],
    ) -> Result<(), DatabaseError>;

    /// Atomically append one message, creating the conversation if needed.
    ///
    /// `created_at` is only written when the conversation is created.
    async fn append_message(
        &self,
        user_id: &str,
        thread_name: &str,
        message: &Message,
    ) -> Result<(), DatabaseError>;

    /// Thread names owned by a user. Order is unspecified.
    async fn list_user_threads(&self, user_id: &str) -> Result<Vec<String>, DatabaseError>;

    /// Delete a conversation. Returns whether a document was removed.
    async fn delete_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<bool, DatabaseError>;

    /// Delete every conversation. Test/reset use only.
    /// Returns the number of conversations removed.
    async fn wipe_all_conversations(&self) -> Result<u64, DatabaseError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&self) -> Result<(), DatabaseError>;
}
