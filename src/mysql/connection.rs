use std::sync::Arc;

use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::params::to_params;
use super::query::build_row;
use crate::config::MysqlConfig;
use crate::error::DriverError;
use crate::results::Row;
use crate::session::{Connection, Connector};
use crate::types::RowValues;

/// Rows fetched ahead of the consumer while a cursor is open.
const CURSOR_BUFFER: usize = 256;

type RowResult = Result<Row, mysql_async::Error>;

/// Connector for the `mysql_async` driver.
///
/// Each connection gets its own current-thread tokio runtime so the blocking
/// [`Connection`] calls never need an ambient runtime. Do not call them from
/// inside an async task.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

impl Connector for MysqlConnector {
    type Connection = MysqlConnection;

    fn connect(&self, config: &MysqlConfig) -> Result<MysqlConnection, DriverError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let conn = runtime.block_on(Conn::new(connect_opts(config)))?;
        Ok(MysqlConnection {
            runtime,
            conn: Some(conn),
            cursor: None,
        })
    }
}

fn connect_opts(config: &MysqlConfig) -> Opts {
    OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .db_name(Some(config.database.clone()))
        .user(Some(config.user.clone()))
        .pass(Some(config.password.clone()))
        .into()
}

/// Unbuffered result stream. The driver connection lives inside `task` until
/// the stream ends, then comes back through the join handle.
struct Cursor {
    rows: mpsc::Receiver<RowResult>,
    task: JoinHandle<Conn>,
}

/// One blocking MySQL connection.
pub struct MysqlConnection {
    runtime: Runtime,
    conn: Option<Conn>,
    cursor: Option<Cursor>,
}

impl MysqlConnection {
    fn conn_mut(conn: &mut Option<Conn>) -> Result<&mut Conn, DriverError> {
        conn.as_mut()
            .ok_or_else(|| "mysql connection is busy with a cursor or was lost".into())
    }

    fn query_drop(&mut self, statement: &'static str) -> Result<(), DriverError> {
        let conn = Self::conn_mut(&mut self.conn)?;
        self.runtime.block_on(conn.query_drop(statement))?;
        Ok(())
    }

    /// Wait for the streaming task after the last row and take the connection back.
    fn finish_cursor(&mut self) -> Result<(), DriverError> {
        if let Some(cursor) = self.cursor.take() {
            drop(cursor.rows);
            let conn = self.runtime.block_on(cursor.task)?;
            self.conn = Some(conn);
        }
        Ok(())
    }
}

async fn stream_rows(mut conn: Conn, query: String, tx: mpsc::Sender<RowResult>) -> Conn {
    if let Err(err) = pump_rows(&mut conn, &query, &tx).await {
        let _ = tx.send(Err(err)).await;
    }
    conn
}

async fn pump_rows(
    conn: &mut Conn,
    query: &str,
    tx: &mpsc::Sender<RowResult>,
) -> Result<(), mysql_async::Error> {
    let mut result = conn.query_iter(query).await?;
    let columns: Arc<Vec<String>> = Arc::new(
        result
            .columns()
            .map(|cols| cols.iter().map(|c| c.name_str().into_owned()).collect())
            .unwrap_or_default(),
    );
    while let Some(row) = result.next().await? {
        if tx.send(Ok(build_row(&columns, row))).await.is_err() {
            break;
        }
    }
    Ok(())
}

impl Connection for MysqlConnection {
    fn open_cursor(&mut self, query: &str) -> Result<(), DriverError> {
        self.close_cursor();
        let conn = self
            .conn
            .take()
            .ok_or("mysql connection was lost by an abandoned cursor")?;
        let (tx, rx) = mpsc::channel(CURSOR_BUFFER);
        let task = self.runtime.spawn(stream_rows(conn, query.to_string(), tx));
        self.cursor = Some(Cursor { rows: rx, task });
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>, DriverError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err("no open cursor".into());
        };
        match self.runtime.block_on(cursor.rows.recv()) {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => {
                self.finish_cursor()?;
                Err(err.into())
            }
            None => {
                self.finish_cursor()?;
                Ok(None)
            }
        }
    }

    fn close_cursor(&mut self) {
        // Draining the rest of an unbuffered result could read the whole table,
        // so an abandoned cursor takes its connection down with it.
        if let Some(cursor) = self.cursor.take() {
            drop(cursor.rows);
            cursor.task.abort();
            let _ = self.runtime.block_on(cursor.task);
        }
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.query_drop("START TRANSACTION")
    }

    fn exec_batch(
        &mut self,
        statement: &str,
        batch: &[Vec<RowValues>],
    ) -> Result<(), DriverError> {
        let conn = Self::conn_mut(&mut self.conn)?;
        let params = batch
            .iter()
            .map(|tuple| to_params(tuple))
            .collect::<Result<Vec<_>, _>>()?;
        self.runtime.block_on(conn.exec_batch(statement, params))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.query_drop("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.query_drop("ROLLBACK")
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.close_cursor();
        if let Some(conn) = self.conn.take() {
            self.runtime.block_on(conn.disconnect())?;
        }
        Ok(())
    }
}
