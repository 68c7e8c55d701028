//! Conversation and message types shared by every backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Derive the primary key of a conversation document.
///
/// The format is `<user_id>_<thread_name>`; it is part of the persisted
/// document shape and must not change.
pub fn conversation_id(user_id: &str, thread_name: &str) -> String {
    format!("{user_id}_{thread_name}")
}

/// A single chat message.
///
/// Messages are open key/value objects: `role` and `content` are the usual
/// keys but any other field is stored and returned untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("role".into(), Value::String(role.into()));
        map.insert("content".into(), Value::String(content.into()));
        Self(map)
    }

    /// Add or replace an arbitrary field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn role(&self) -> Option<&str> {
        self.0.get("role").and_then(Value::as_str)
    }

    pub fn content(&self) -> Option<&str> {
        self.0.get("content").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Message {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A persisted conversation: every message under one (user, thread) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub thread_name: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse an RFC 3339 timestamp as written by the store.
///
/// Unparseable values map to `DateTime::<Utc>::MIN_UTC` rather than failing
/// the whole read.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Current time in the persisted timestamp format.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
