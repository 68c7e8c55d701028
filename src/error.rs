//! Error types for the conversation store.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
///
/// Driver errors are carried as-is so callers see exactly what the store
/// reported (connectivity, duplicate key, ...).
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store is closed")]
    Closed,
}

impl From<serde_json::Error> for DatabaseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for DatabaseError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<mongodb::bson::de::Error> for DatabaseError {
    fn from(e: mongodb::bson::de::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
