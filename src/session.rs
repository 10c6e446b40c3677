use tracing::{debug, info, warn};

use crate::config::MysqlConfig;
use crate::error::{DriverError, MysqlClientError};
use crate::results::Row;
use crate::types::RowValues;

/// A live database connection as seen by the session layer.
///
/// Calls block until the driver answers. A connection holds at most one open
/// cursor; opening a new one discards the previous cursor.
pub trait Connection: Send {
    /// Execute `query` and keep its result as an unbuffered, forward-only cursor.
    fn open_cursor(&mut self, query: &str) -> Result<(), DriverError>;

    /// Pull the next row from the open cursor; `None` once it is exhausted.
    fn fetch_next(&mut self) -> Result<Option<Row>, DriverError>;

    /// Drop the open cursor, if any, without reading the remaining rows.
    fn close_cursor(&mut self);

    fn begin(&mut self) -> Result<(), DriverError>;

    /// Execute `statement` once per value tuple in `batch`.
    fn exec_batch(&mut self, statement: &str, batch: &[Vec<RowValues>])
    -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Release the connection. Called at most once by [`Session`].
    fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens connections for a [`MysqlConfig`].
pub trait Connector: Send + Sync {
    type Connection: Connection;

    fn connect(&self, config: &MysqlConfig) -> Result<Self::Connection, DriverError>;
}

/// Scoped ownership of one connection.
///
/// The connection is closed by [`Session::close`] or, at the latest, when the
/// session is dropped, on success and error paths alike.
pub struct Session<C: Connection> {
    conn: Option<C>,
}

impl<C: Connection> Session<C> {
    /// Connect with `connector`.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ConnectionError` if the driver cannot connect.
    pub fn open<K>(connector: &K, config: &MysqlConfig) -> Result<Self, MysqlClientError>
    where
        K: Connector<Connection = C> + ?Sized,
    {
        let conn = connector
            .connect(config)
            .map_err(MysqlClientError::connection)?;
        debug!(host = %config.host, port = config.port, database = %config.database, "opened mysql session");
        Ok(Self { conn: Some(conn) })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&mut self) -> Result<&mut C, MysqlClientError> {
        self.conn
            .as_mut()
            .ok_or_else(|| MysqlClientError::connection("session is closed"))
    }

    /// Submit `query` as a streaming cursor; rows are pulled with [`Session::fetch_next`].
    ///
    /// The driver may only report a failing statement on the first fetch.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ExecutionError` if the statement is rejected up front.
    pub fn execute(&mut self, query: &str) -> Result<(), MysqlClientError> {
        self.conn()?
            .open_cursor(query)
            .map_err(|e| MysqlClientError::execution(query, e))?;
        debug!(query, "submitted query");
        Ok(())
    }

    /// Next row of the cursor opened by [`Session::execute`].
    ///
    /// # Errors
    /// Returns `MysqlClientError::ExecutionError` if fetching fails; `query` is attached to it.
    pub fn fetch_next(&mut self, query: &str) -> Result<Option<Row>, MysqlClientError> {
        self.conn()?
            .fetch_next()
            .map_err(|e| MysqlClientError::execution(query, e))
    }

    /// Execute `query` and collect every row.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ExecutionError` if execution or any fetch fails.
    pub fn fetch_all(&mut self, query: &str) -> Result<Vec<Row>, MysqlClientError> {
        self.execute(query)?;
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_next(query)? {
            rows.push(row);
        }
        info!(query, rows = rows.len(), "successfully executed query");
        Ok(rows)
    }

    /// Execute `statement` for every tuple of `batch` in one transaction and commit.
    ///
    /// On failure the transaction is rolled back before the error is returned.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ExecutionError` if begin, execution or commit fails.
    pub fn load(
        &mut self,
        statement: &str,
        batch: &[Vec<RowValues>],
    ) -> Result<(), MysqlClientError> {
        let conn = self.conn()?;
        let outcome = conn
            .begin()
            .and_then(|()| conn.exec_batch(statement, batch))
            .and_then(|()| conn.commit());
        match outcome {
            Ok(()) => {
                info!(query = statement, rows = batch.len(), "successfully executed query");
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = conn.rollback() {
                    warn!(error = %rollback_err, query = statement, "rollback failed");
                }
                Err(MysqlClientError::execution(statement, err))
            }
        }
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close_cursor();
            match conn.close() {
                Ok(()) => debug!("closed mysql session"),
                Err(err) => warn!(error = %err, "failed to close mysql session"),
            }
        }
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        self.close();
    }
}
