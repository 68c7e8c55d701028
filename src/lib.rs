//! Conversation store — chat threads persisted as one document per (user, thread).

pub mod config;
pub mod error;
pub mod store;

pub use config::{StoreBackend, StoreConfig};
pub use error::{ConfigError, DatabaseError};
pub use store::{Conversation, ConversationStore, Message, conversation_id};
