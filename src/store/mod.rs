//! Persistence layer — conversation documents on MongoDB or libSQL.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod mongo_backend;
pub mod traits;

use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::DatabaseError;

pub use libsql_backend::LibSqlBackend;
pub use model::{Conversation, Message, conversation_id};
pub use mongo_backend::MongoBackend;
pub use traits::ConversationStore;

/// Open the backend selected by `config`, with indexes in place.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>, DatabaseError> {
    let uri = config.uri.expose_secret();
    let store: Arc<dyn ConversationStore> = match config.backend {
        StoreBackend::MongoDb => Arc::new(MongoBackend::connect(uri, &config.database_name).await?),
        StoreBackend::LibSql => Arc::new(LibSqlBackend::open(uri).await?),
    };
    tracing::info!(backend = %config.backend, "Conversation store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_libsql_memory() {
        let store = connect(&StoreConfig::libsql(":memory:")).await.unwrap();
        store
            .append_message("u1", "t1", &Message::new("user", "hi"))
            .await
            .unwrap();
        assert_eq!(store.list_user_threads("u1").await.unwrap(), vec!["t1"]);
        store.close().await.unwrap();
    }
}
