use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::MysqlConfig;
use crate::error::MysqlClientError;
use crate::estimate::checked_estimate;
use crate::query::{StatementKind, explain_query, validate_query};
use crate::results::Row;
use crate::session::{Connection, Connector, Session};
use crate::types::RowValues;

/// A validated connection config plus the connector used to open sessions.
///
/// Every operation opens its own [`Session`]; nothing is pooled.
pub struct MysqlClient<K: Connector> {
    connector: Arc<K>,
    config: MysqlConfig,
}

impl<K: Connector> Clone for MysqlClient<K> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
        }
    }
}

#[cfg(feature = "mysql")]
impl MysqlClient<crate::mysql::MysqlConnector> {
    /// Client backed by the `mysql_async` driver.
    #[must_use]
    pub fn mysql(config: MysqlConfig) -> Self {
        Self::new(crate::mysql::MysqlConnector, config)
    }
}

impl<K: Connector> MysqlClient<K> {
    #[must_use]
    pub fn new(connector: K, config: MysqlConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
        }
    }

    /// Build a client from a connection mapping.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ConfigError` if the mapping's key set is not exactly
    /// `host, port, database, user, password`.
    pub fn from_map(
        connector: K,
        config: &HashMap<String, JsonValue>,
    ) -> Result<Self, MysqlClientError> {
        Ok(Self::new(connector, MysqlConfig::from_map(config)?))
    }

    #[must_use]
    pub fn config(&self) -> &MysqlConfig {
        &self.config
    }

    /// Open a dedicated session.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ConnectionError` if the connection cannot be established.
    pub fn open_session(&self) -> Result<Session<K::Connection>, MysqlClientError> {
        Session::open(self.connector.as_ref(), &self.config)
    }

    /// Execute a SELECT and stream its rows lazily over an unbuffered cursor.
    ///
    /// # Errors
    /// Returns `QueryValidationError` for a non-SELECT query, `ConnectionError` if the
    /// session cannot be opened, or `ExecutionError` if the statement fails.
    pub fn record_stream(&self, query: &str) -> Result<RecordStream<K::Connection>, MysqlClientError> {
        validate_query(query, StatementKind::Select)?;
        let mut session = self.open_session()?;
        session.execute(query)?;
        Ok(RecordStream {
            session,
            query: query.to_string(),
            done: false,
        })
    }

    /// Approximate the number of rows `query` returns from the planner, without running it.
    ///
    /// # Errors
    /// Returns `QueryValidationError` for a non-SELECT query, `ConnectionError` or
    /// `ExecutionError` from the driver, and `EstimationError` when the estimate is `<= 0`.
    pub fn rough_counts_estimator(&self, query: &str) -> Result<u64, MysqlClientError> {
        validate_query(query, StatementKind::Select)?;
        let count_query = explain_query(query);
        let mut session = self.open_session()?;
        let plan = session.fetch_all(&count_query)?;
        session.close();
        let total = checked_estimate(&plan, &count_query)?;
        debug!(total, query = %count_query, "estimated row count");
        Ok(total)
    }

    /// Run one INSERT for every tuple of `batch` in its own session and transaction.
    ///
    /// # Errors
    /// Returns `QueryValidationError` for a non-INSERT statement, `ConnectionError`, or
    /// `ExecutionError` after the transaction was rolled back.
    pub fn record_loader(
        &self,
        statement: &str,
        batch: &[Vec<RowValues>],
    ) -> Result<(), MysqlClientError> {
        validate_query(statement, StatementKind::Insert)?;
        let mut session = self.open_session()?;
        session.load(statement, batch)
    }
}

/// Forward-only, non-restartable rows of one SELECT.
///
/// Owns its session; the connection is closed once the rows are exhausted,
/// after the first error, or when the stream is dropped.
pub struct RecordStream<C: Connection> {
    session: Session<C>,
    query: String,
    done: bool,
}

impl<C: Connection> RecordStream<C> {
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Stop reading and release the connection.
    pub fn close(&mut self) {
        self.done = true;
        self.session.close();
    }
}

impl<C: Connection> Iterator for RecordStream<C> {
    type Item = Result<Row, MysqlClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.session.fetch_next(&self.query) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.close();
                None
            }
            Err(err) => {
                self.close();
                Some(Err(err))
            }
        }
    }
}
