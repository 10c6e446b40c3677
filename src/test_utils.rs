//! Scripted in-memory driver for exercising sessions, readers and writers
//! without a MySQL server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::MysqlConfig;
use crate::error::DriverError;
use crate::results::Row;
use crate::session::{Connection, Connector};
use crate::types::RowValues;

/// Calls observed by a [`MockConnector`]'s connections, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Connect,
    OpenCursor(String),
    Begin,
    ExecBatch { statement: String, rows: usize },
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Default)]
struct Recorded {
    events: Vec<MockEvent>,
    batches: Vec<(String, Vec<Vec<RowValues>>)>,
}

#[derive(Debug, Clone, Default)]
struct Script {
    plan: Vec<Row>,
    rows: Vec<Row>,
    fail_connect: bool,
    fail_query: bool,
    fail_exec_batch: bool,
    fail_fetch_after: Option<usize>,
}

/// Connector whose connections serve scripted rows and record every call.
///
/// Queries starting with `EXPLAIN` are answered with the planner rows set by
/// [`MockConnector::with_plan`]; every other query gets the data rows.
/// Clones share the recorded calls.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    script: Script,
    recorded: Arc<Mutex<Recorded>>,
}

fn lock(recorded: &Mutex<Recorded>) -> MutexGuard<'_, Recorded> {
    recorded.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_plan(mut self, plan: Vec<Row>) -> Self {
        self.script.plan = plan;
        self
    }

    #[must_use]
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.script.rows = rows;
        self
    }

    /// Data rows `{id: i, name: "row-i"}` for `i` in `0..count`.
    #[must_use]
    pub fn with_numbered_rows(self, count: usize) -> Self {
        self.with_rows(numbered_rows(count))
    }

    #[must_use]
    pub fn fail_connect(mut self) -> Self {
        self.script.fail_connect = true;
        self
    }

    #[must_use]
    pub fn fail_query(mut self) -> Self {
        self.script.fail_query = true;
        self
    }

    #[must_use]
    pub fn fail_exec_batch(mut self) -> Self {
        self.script.fail_exec_batch = true;
        self
    }

    /// Fail every fetch after `rows` rows were returned by a cursor.
    #[must_use]
    pub fn fail_fetch_after(mut self, rows: usize) -> Self {
        self.script.fail_fetch_after = Some(rows);
        self
    }

    #[must_use]
    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.recorded).events.clone()
    }

    /// Text of every query a cursor was opened for.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        lock(&self.recorded)
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::OpenCursor(query) => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    /// Statement and value tuples of every successful `exec_batch`.
    #[must_use]
    pub fn batches(&self) -> Vec<(String, Vec<Vec<RowValues>>)> {
        lock(&self.recorded).batches.clone()
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    fn connect(&self, _config: &MysqlConfig) -> Result<MockConnection, DriverError> {
        if self.script.fail_connect {
            return Err("scripted connect failure".into());
        }
        lock(&self.recorded).events.push(MockEvent::Connect);
        Ok(MockConnection {
            script: self.script.clone(),
            recorded: Arc::clone(&self.recorded),
            cursor: None,
            fetched: 0,
        })
    }
}

/// Connection handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockConnection {
    script: Script,
    recorded: Arc<Mutex<Recorded>>,
    cursor: Option<VecDeque<Row>>,
    fetched: usize,
}

impl MockConnection {
    fn record(&self, event: MockEvent) {
        lock(&self.recorded).events.push(event);
    }
}

impl Connection for MockConnection {
    fn open_cursor(&mut self, query: &str) -> Result<(), DriverError> {
        self.record(MockEvent::OpenCursor(query.to_string()));
        if self.script.fail_query {
            return Err("scripted query failure".into());
        }
        let rows = if query.trim_start().starts_with("EXPLAIN") {
            &self.script.plan
        } else {
            &self.script.rows
        };
        self.cursor = Some(rows.iter().cloned().collect());
        self.fetched = 0;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>, DriverError> {
        let cursor = self.cursor.as_mut().ok_or("no open cursor")?;
        if self
            .script
            .fail_fetch_after
            .is_some_and(|limit| self.fetched >= limit)
        {
            return Err("scripted fetch failure".into());
        }
        let row = cursor.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }

    fn close_cursor(&mut self) {
        self.cursor = None;
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.record(MockEvent::Begin);
        Ok(())
    }

    fn exec_batch(
        &mut self,
        statement: &str,
        batch: &[Vec<RowValues>],
    ) -> Result<(), DriverError> {
        self.record(MockEvent::ExecBatch {
            statement: statement.to_string(),
            rows: batch.len(),
        });
        if self.script.fail_exec_batch {
            return Err("scripted exec_batch failure".into());
        }
        lock(&self.recorded)
            .batches
            .push((statement.to_string(), batch.to_vec()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.record(MockEvent::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.record(MockEvent::Rollback);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.record(MockEvent::Close);
        Ok(())
    }
}

/// One `EXPLAIN` output row.
#[must_use]
pub fn explain_row(select_type: &str, rows: i64) -> Row {
    Row::from_pairs([
        ("id", RowValues::Int(1)),
        ("select_type", RowValues::Text(select_type.to_string())),
        ("table", RowValues::Text("subq".to_string())),
        ("rows", RowValues::Int(rows)),
    ])
}

/// Rows `{id: i, name: "row-i"}` for `i` in `0..count`.
#[must_use]
pub fn numbered_rows(count: usize) -> Vec<Row> {
    let columns = Arc::new(vec!["id".to_string(), "name".to_string()]);
    (0..count)
        .map(|i| {
            let id = i64::try_from(i).unwrap_or(i64::MAX);
            Row::new(
                Arc::clone(&columns),
                vec![RowValues::Int(id), RowValues::Text(format!("row-{i}"))],
            )
        })
        .collect()
}
