//! Configuration types.

use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/";
pub const DEFAULT_LIBSQL_PATH: &str = "./data/conversations.db";
pub const DEFAULT_DATABASE_NAME: &str = "chai_db";

/// Which storage engine backs the conversation store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    MongoDb,
    LibSql,
}

impl StoreBackend {
    fn default_uri(self) -> &'static str {
        match self {
            Self::MongoDb => DEFAULT_MONGO_URI,
            Self::LibSql => DEFAULT_LIBSQL_PATH,
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MongoDb => write!(f, "mongodb"),
            Self::LibSql => write!(f, "libsql"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            "libsql" | "sqlite" => Ok(Self::LibSql),
            other => Err(ConfigError::InvalidValue {
                key: "CONVERSATION_STORE_BACKEND".to_string(),
                message: format!("unknown backend '{other}' (expected mongodb or libsql)"),
            }),
        }
    }
}

/// Connection settings for the conversation store.
///
/// `uri` is a MongoDB connection string, or a file path / `:memory:` for
/// libSQL. It may carry credentials, so it is kept secret.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub uri: SecretString,
    /// Database name. Only meaningful for MongoDB.
    pub database_name: String,
}

impl StoreConfig {
    pub fn mongodb(uri: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::MongoDb,
            uri: SecretString::from(uri.into()),
            database_name: database_name.into(),
        }
    }

    pub fn libsql(path: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::LibSql,
            uri: SecretString::from(path.into()),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
        }
    }

    /// Build from `CONVERSATION_STORE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset and blank values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let backend = match var("CONVERSATION_STORE_BACKEND") {
            Some(s) => s.parse()?,
            None => StoreBackend::default(),
        };

        let uri = var("CONVERSATION_STORE_URI").unwrap_or_else(|| backend.default_uri().to_string());
        let database_name =
            var("CONVERSATION_STORE_DB").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        Ok(Self {
            backend,
            uri: SecretString::from(uri),
            database_name,
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::mongodb(DEFAULT_MONGO_URI, DEFAULT_DATABASE_NAME)
    }
}
