use tracing::{debug, warn};

use crate::client::MysqlClient;
use crate::config::WriteOptions;
use crate::error::MysqlClientError;
use crate::query::build_insert_statement;
use crate::results::Row;
use crate::session::{Connection, Connector, Session};
use crate::types::RowValues;

/// Loads rows into one table in fixed-size batches.
///
/// Each batch is written by a single INSERT (or upsert) executed for every
/// pending value tuple and committed as one transaction. A failed batch is
/// rolled back and stays pending.
pub struct BatchWriter<C: Connection> {
    session: Session<C>,
    database: String,
    options: WriteOptions,
    columns: Option<Vec<String>>,
    statement: Option<String>,
    batch: Vec<Vec<RowValues>>,
    written: u64,
}

impl<C: Connection> BatchWriter<C> {
    /// Open a writer with its own session from `client`.
    ///
    /// # Errors
    /// Returns `ConfigError` for invalid options or `ConnectionError` if the session cannot be opened.
    pub fn open<K>(client: &MysqlClient<K>, options: WriteOptions) -> Result<Self, MysqlClientError>
    where
        K: Connector<Connection = C>,
    {
        options.validate()?;
        let session = client.open_session()?;
        Self::new(session, client.config().database.clone(), options)
    }

    /// Writer over an already open session.
    ///
    /// # Errors
    /// Returns `ConfigError` for invalid options.
    pub fn new(
        session: Session<C>,
        database: impl Into<String>,
        options: WriteOptions,
    ) -> Result<Self, MysqlClientError> {
        options.validate()?;
        let batch = Vec::with_capacity(options.batch_size);
        Ok(Self {
            session,
            database: database.into(),
            options,
            columns: None,
            statement: None,
            batch,
            written: 0,
        })
    }

    /// Value tuples waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> &[Vec<RowValues>] {
        &self.batch
    }

    /// Statement built for the most recent row.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    /// Rows committed so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Queue one row, flushing when the batch reaches `batch_size`.
    ///
    /// A row with a different column list than the pending batch flushes that batch first.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ExecutionError` if a flush fails; the batch is kept.
    pub fn write(&mut self, row: &Row) -> Result<(), MysqlClientError> {
        let columns = row.column_names();
        if self.columns.as_deref() != Some(columns) {
            self.flush()?;
            self.statement = Some(build_insert_statement(
                &self.database,
                &self.options.table,
                columns,
                self.options.do_upsert,
            ));
            self.columns = Some(columns.to_vec());
        }

        self.batch.push(row.values().to_vec());
        if self.batch.len() >= self.options.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write every row of `rows`, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first flush error.
    pub fn write_all<'a, I>(&mut self, rows: I) -> Result<(), MysqlClientError>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        rows.into_iter().try_for_each(|row| self.write(row))
    }

    /// Write the pending batch now. No-op when nothing is pending.
    ///
    /// # Errors
    /// Returns `MysqlClientError::ExecutionError` after rolling back; the batch is kept.
    pub fn flush(&mut self) -> Result<(), MysqlClientError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let Some(statement) = self.statement.as_deref() else {
            return Ok(());
        };
        self.session.load(statement, &self.batch)?;
        let rows = self.batch.len();
        self.written += rows as u64;
        self.batch.clear();
        debug!(rows, table = %self.options.table, "flushed batch");
        Ok(())
    }

    /// Flush any trailing partial batch and close the session.
    ///
    /// Returns the total number of rows written. On error the session stays open
    /// and the batch stays pending so the caller may retry.
    ///
    /// # Errors
    /// Returns the flush error.
    pub fn finish(&mut self) -> Result<u64, MysqlClientError> {
        self.flush()?;
        self.session.close();
        Ok(self.written)
    }
}

impl<C: Connection> Drop for BatchWriter<C> {
    fn drop(&mut self) {
        if !self.batch.is_empty() {
            warn!(
                rows = self.batch.len(),
                table = %self.options.table,
                "batch writer dropped with unflushed rows"
            );
        }
    }
}
