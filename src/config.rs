use std::collections::{BTreeSet, HashMap};
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::MysqlClientError;

pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Keys a connection mapping must carry, no more and no less.
pub const REQUIRED_KEYS: [&str; 5] = ["host", "port", "database", "user", "password"];

/// Connection settings for one MySQL server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysqlConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl fmt::Debug for MysqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl MysqlConfig {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build a config from a key/value mapping.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ConfigError` if the key set is not exactly
    /// `host, port, database, user, password`, or if a value has the wrong shape.
    pub fn from_map(map: &HashMap<String, JsonValue>) -> Result<Self, MysqlClientError> {
        let required: BTreeSet<&str> = REQUIRED_KEYS.into_iter().collect();
        let actual: BTreeSet<&str> = map.keys().map(String::as_str).collect();
        if required != actual {
            return Err(MysqlClientError::ConfigError(format!(
                "Config is not satisfied. required: {required:?}, actual: {actual:?}"
            )));
        }

        Ok(Self {
            host: string_value(map, "host")?,
            port: port_value(map)?,
            database: string_value(map, "database")?,
            user: string_value(map, "user")?,
            password: string_value(map, "password")?,
        })
    }
}

impl TryFrom<&HashMap<String, JsonValue>> for MysqlConfig {
    type Error = MysqlClientError;

    fn try_from(map: &HashMap<String, JsonValue>) -> Result<Self, Self::Error> {
        Self::from_map(map)
    }
}

fn string_value(map: &HashMap<String, JsonValue>, key: &str) -> Result<String, MysqlClientError> {
    match map.get(key) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        other => Err(MysqlClientError::ConfigError(format!(
            "{key} must be a string, got {other:?}"
        ))),
    }
}

fn port_value(map: &HashMap<String, JsonValue>) -> Result<u16, MysqlClientError> {
    let port = match map.get("port") {
        Some(JsonValue::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(JsonValue::String(s)) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    port.ok_or_else(|| {
        MysqlClientError::ConfigError(format!(
            "port must be an integer in 0..=65535, got {:?}",
            map.get("port")
        ))
    })
}

/// How a reader maps its bundle's offset range onto the query's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum OffsetStrategy {
    /// Wrap the query with `LIMIT start, count` so each bundle reads its own window.
    #[default]
    SqlWindow,
    /// Run the full query and discard the first `start` rows before claiming.
    Skip,
    /// Run the full query and count positions from `start` without skipping.
    ///
    /// Bundles overlap on the leading rows; only useful to reproduce legacy output.
    Unscoped,
}

/// Settings for reading one SELECT query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub query: String,
    pub offset_strategy: OffsetStrategy,
}

impl ReadOptions {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            offset_strategy: OffsetStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_offset_strategy(mut self, offset_strategy: OffsetStrategy) -> Self {
        self.offset_strategy = offset_strategy;
        self
    }
}

/// Settings for loading rows into one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub table: String,
    pub batch_size: usize,
    pub do_upsert: bool,
}

impl WriteOptions {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            do_upsert: false,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_upsert(mut self, do_upsert: bool) -> Self {
        self.do_upsert = do_upsert;
        self
    }

    /// # Errors
    /// Returns `MysqlClientError::ConfigError` for an empty table name or a zero batch size.
    pub fn validate(&self) -> Result<(), MysqlClientError> {
        if self.table.trim().is_empty() {
            return Err(MysqlClientError::ConfigError(
                "table is required".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(MysqlClientError::ConfigError(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
