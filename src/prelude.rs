//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so that
//! `use mysql_bounded_io::prelude::*;` covers reading and writing.

pub use crate::client::{MysqlClient, RecordStream};
pub use crate::config::{MysqlConfig, OffsetStrategy, ReadOptions, WriteOptions};
pub use crate::error::MysqlClientError;
pub use crate::results::Row;
pub use crate::session::{Connection, Connector, Session};
pub use crate::source::{MysqlSource, RangeReader};
pub use crate::split::{Bundle, OffsetRange, SplitPlan};
pub use crate::tracker::{OffsetRangeTracker, RangeTracker};
pub use crate::types::RowValues;
pub use crate::writer::BatchWriter;

#[cfg(feature = "mysql")]
pub use crate::mysql::{MysqlConnection, MysqlConnector};
