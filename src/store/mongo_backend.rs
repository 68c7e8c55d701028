//! MongoDB backend — `ConversationStore` on a `conversations` collection.
//!
//! One document per (user_id, thread_name), keyed by the derived
//! `<user_id>_<thread_name>` identifier. Appends rely on a single
//! `update_one` upsert combining `$push`, `$set` and `$setOnInsert`, so the
//! server applies them atomically per document.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::model::{Conversation, Message, conversation_id, now_rfc3339, parse_datetime};
use crate::store::traits::ConversationStore;

pub const COLLECTION_NAME: &str = "conversations";

/// Persisted document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationDocument {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    thread_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<Message>>,
    created_at: String,
    updated_at: String,
}

impl From<ConversationDocument> for Conversation {
    fn from(doc: ConversationDocument) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            thread_name: doc.thread_name,
            messages: doc.messages.unwrap_or_default(),
            created_at: parse_datetime(&doc.created_at),
            updated_at: parse_datetime(&doc.updated_at),
        }
    }
}

/// MongoDB conversation store.
pub struct MongoBackend {
    client: Mutex<Option<Client>>,
    database_name: String,
}

impl MongoBackend {
    /// Connect with a connection string and ensure the collection indexes.
    pub async fn connect(uri: &str, database_name: &str) -> Result<Self, DatabaseError> {
        let client = Client::with_uri_str(uri).await?;
        let backend = Self::with_client(client, database_name);
        backend.ensure_indexes().await?;
        info!(database = database_name, "Connected to MongoDB");
        Ok(backend)
    }

    /// Wrap an existing client without touching the server.
    pub fn with_client(client: Client, database_name: &str) -> Self {
        Self {
            client: Mutex::new(Some(client)),
            database_name: database_name.to_string(),
        }
    }

    fn collection(&self) -> Result<Collection<Document>, DatabaseError> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|client| {
                client
                    .database(&self.database_name)
                    .collection(COLLECTION_NAME)
            })
            .ok_or(DatabaseError::Closed)
    }
}

// ── Document builders ───────────────────────────────────────────────

/// Unique (user_id, thread_name) index, then the per-user listing index.
fn index_models() -> [IndexModel; 2] {
    [
        IndexModel::builder()
            .keys(doc! { "user_id": 1, "thread_name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build(),
        IndexModel::builder().keys(doc! { "user_id": 1 }).build(),
    ]
}

fn pair_filter(user_id: &str, thread_name: &str) -> Document {
    doc! { "user_id": user_id, "thread_name": thread_name }
}

fn full_document(
    user_id: &str,
    thread_name: &str,
    messages: &[Message],
    now: &str,
) -> Result<Document, DatabaseError> {
    let document = ConversationDocument {
        id: conversation_id(user_id, thread_name),
        user_id: user_id.to_string(),
        thread_name: thread_name.to_string(),
        messages: Some(messages.to_vec()),
        created_at: now.to_string(),
        updated_at: now.to_string(),
    };
    Ok(bson::to_document(&document)?)
}

/// `_id` is seeded from the upsert filter, so it is not repeated in
/// `$setOnInsert`.
fn append_update(
    user_id: &str,
    thread_name: &str,
    message: &Message,
    now: &str,
) -> Result<Document, DatabaseError> {
    let message = bson::to_bson(message)?;
    Ok(doc! {
        "$push": { "messages": message },
        "$set": { "updated_at": now },
        "$setOnInsert": {
            "user_id": user_id,
            "thread_name": thread_name,
            "created_at": now,
        },
    })
}

fn messages_from_document(document: &Document) -> Result<Vec<Message>, DatabaseError> {
    match document.get("messages") {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(value) => Ok(bson::from_bson(value.clone())?),
    }
}

#[async_trait]
impl ConversationStore for MongoBackend {
    async fn ensure_indexes(&self) -> Result<(), DatabaseError> {
        let collection = self.collection()?;
        for model in index_models() {
            collection.create_index(model).await?;
        }

        debug!(collection = COLLECTION_NAME, "Conversation indexes ensured");
        Ok(())
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<Vec<Message>, DatabaseError> {
        let document = self
            .collection()?
            .find_one(pair_filter(user_id, thread_name))
            .projection(doc! { "messages": 1 })
            .await?;

        match document {
            Some(document) => messages_from_document(&document),
            None => Ok(Vec::new()),
        }
    }

    async fn find_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let document = self
            .collection()?
            .find_one(pair_filter(user_id, thread_name))
            .await?;

        match document {
            Some(document) => {
                let parsed: ConversationDocument = bson::from_document(document)?;
                Ok(Some(parsed.into()))
            }
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
        let document = full_document(user_id, thread_name, messages, &now_rfc3339())?;

        self.collection()?
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
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
        let update = append_update(user_id, thread_name, message, &now_rfc3339())?;

        self.collection()?
            .update_one(doc! { "_id": id }, update)
            .upsert(true)
            .await?;

        debug!(user_id, thread_name, "Message appended");
        Ok(())
    }

    async fn list_user_threads(&self, user_id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut cursor = self
            .collection()?
            .find(doc! { "user_id": user_id })
            .projection(doc! { "thread_name": 1, "_id": 0 })
            .await?;

        let mut threads = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            match document.get_str("thread_name") {
                Ok(name) => threads.push(name.to_string()),
                Err(e) => tracing::warn!(user_id, "Skipping conversation without thread_name: {e}"),
            }
        }
        Ok(threads)
    }

    async fn delete_conversation(
        &self,
        user_id: &str,
        thread_name: &str,
    ) -> Result<bool, DatabaseError> {
        let id = conversation_id(user_id, thread_name);
        let result = self.collection()?.delete_one(doc! { "_id": id }).await?;

        debug!(user_id, thread_name, deleted = result.deleted_count, "Conversation delete");
        Ok(result.deleted_count > 0)
    }

    async fn wipe_all_conversations(&self) -> Result<u64, DatabaseError> {
        let result = self.collection()?.delete_many(doc! {}).await?;

        info!(count = result.deleted_count, "Wiped all conversations");
        Ok(result.deleted_count)
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = client {
            client.shutdown().await;
            info!("MongoDB client closed");
        }
        Ok(())
    }
}
