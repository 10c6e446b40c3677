//! Parallel, resumable, bounded reads of one MySQL SELECT plus a batched,
//! upsert-capable writer.
//!
//! The read side splits a query's estimated row range into [`Bundle`]s that
//! are read independently by [`RangeReader`]s, each on its own connection and
//! cooperating with a shared [`RangeTracker`] so ranges can be narrowed while
//! they are being read. The write side, [`BatchWriter`], loads rows in
//! committed batches.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mysql_bounded_io::prelude::*;
//!
//! # fn main() -> Result<(), MysqlClientError> {
//! let client = MysqlClient::mysql(MysqlConfig::new("localhost", "shop", "reader", "secret"));
//! let source = MysqlSource::new(client, ReadOptions::new("SELECT id, name FROM users"))?;
//! for bundle in source.split(1, None, None)? {
//!     let tracker = Arc::new(OffsetRangeTracker::new(bundle.range));
//!     for row in source.read(tracker)? {
//!         println!("{:?}", row?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod estimate;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod prelude;
pub mod query;
pub mod results;
pub mod session;
pub mod source;
pub mod split;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tracker;
pub mod types;
pub mod writer;

pub use client::{MysqlClient, RecordStream};
pub use config::{MysqlConfig, OffsetStrategy, ReadOptions, WriteOptions};
pub use error::{DriverError, MysqlClientError};
pub use results::Row;
pub use session::{Connection, Connector, Session};
pub use source::{MysqlSource, RangeReader};
pub use split::{Bundle, OffsetRange, SplitPlan};
pub use tracker::{OffsetRangeTracker, RangeTracker};
pub use types::RowValues;
pub use writer::BatchWriter;
