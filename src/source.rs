use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::client::{MysqlClient, RecordStream};
use crate::config::{OffsetStrategy, ReadOptions};
use crate::error::MysqlClientError;
use crate::query::{StatementKind, cleanse_query, validate_query, window_query};
use crate::results::Row;
use crate::session::{Connection, Connector};
use crate::split::{OffsetRange, SplitPlan};
use crate::tracker::{OffsetRangeTracker, RangeTracker};

/// A bounded source over the rows of one SELECT query.
///
/// The row count is estimated once from the planner and reused for default
/// ranges and split sizing.
pub struct MysqlSource<K: Connector> {
    client: MysqlClient<K>,
    query: String,
    offset_strategy: OffsetStrategy,
    counts: Mutex<Option<u64>>,
}

impl<K: Connector> MysqlSource<K> {
    /// # Errors
    /// Returns `MysqlClientError::QueryValidationError` if the query is not a SELECT.
    pub fn new(client: MysqlClient<K>, options: ReadOptions) -> Result<Self, MysqlClientError> {
        validate_query(&options.query, StatementKind::Select)?;
        Ok(Self {
            client,
            query: cleanse_query(&options.query).to_string(),
            offset_strategy: options.offset_strategy,
            counts: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Rough number of rows, from the planner; computed on first use.
    ///
    /// # Errors
    /// Propagates connection, execution and estimation errors of the count estimator.
    pub fn estimate_size(&self) -> Result<u64, MysqlClientError> {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(total) = *counts {
            return Ok(total);
        }
        let total = self.client.rough_counts_estimator(&self.query)?;
        *counts = Some(total);
        Ok(total)
    }

    /// Tracker for `[start, stop)`; `start` defaults to 0. Without `stop` the
    /// range runs to the end of the result set, since the estimate may under-count.
    #[must_use]
    pub fn get_range_tracker(&self, start: Option<u64>, stop: Option<u64>) -> OffsetRangeTracker {
        let start = start.unwrap_or(0);
        OffsetRangeTracker::new(stop.map_or_else(
            || OffsetRange::open_ended(start),
            |stop| OffsetRange::new(start, stop),
        ))
    }

    /// Plan bundles over `[start, stop)`; `start` defaults to 0 and `stop` to the estimate.
    ///
    /// When `stop` defaults to the estimate the last bundle is open-ended, so rows
    /// beyond an under-counted estimate are still read. `desired_bundle_size` is
    /// forwarded as the bundle weight only.
    ///
    /// # Errors
    /// Propagates estimator errors.
    pub fn split(
        &self,
        desired_bundle_size: u64,
        start: Option<u64>,
        stop: Option<u64>,
    ) -> Result<SplitPlan, MysqlClientError> {
        let total = self.estimate_size()?;
        let range = OffsetRange::new(start.unwrap_or(0), stop.unwrap_or(total));
        let plan = SplitPlan::new(total, desired_bundle_size, range);
        Ok(if stop.is_none() { plan.with_open_tail() } else { plan })
    }

    /// Open a reader for the range currently held by `tracker`.
    ///
    /// # Errors
    /// Returns `ConnectionError` or `ExecutionError` if the query cannot be started.
    pub fn read<T>(&self, tracker: Arc<T>) -> Result<RangeReader<K::Connection, T>, MysqlClientError>
    where
        T: RangeTracker + ?Sized,
    {
        let start = tracker.start_position();
        let stop = tracker.stop_position();
        if stop <= start {
            return Ok(RangeReader::finished(tracker, start));
        }

        let (query, to_skip) = match self.offset_strategy {
            OffsetStrategy::SqlWindow => {
                let count = if OffsetRange::new(start, stop).is_open_ended() {
                    OffsetRange::OPEN_END
                } else {
                    stop - start
                };
                (window_query(&self.query, start, count), 0)
            }
            OffsetStrategy::Skip => (self.query.clone(), start),
            OffsetStrategy::Unscoped => (self.query.clone(), 0),
        };
        debug!(start, stop, strategy = ?self.offset_strategy, "reading offset range");
        let rows = self.client.record_stream(&query)?;
        Ok(RangeReader {
            rows: Some(rows),
            tracker,
            next_position: start,
            to_skip,
        })
    }
}

/// Rows of one offset range, claimed position by position.
///
/// The reader stops, and closes its session, as soon as a claim is refused,
/// the rows run out, or an error occurs. Errors are yielded once.
pub struct RangeReader<C: Connection, T: RangeTracker + ?Sized> {
    rows: Option<RecordStream<C>>,
    tracker: Arc<T>,
    next_position: u64,
    to_skip: u64,
}

impl<C: Connection, T: RangeTracker + ?Sized> RangeReader<C, T> {
    fn finished(tracker: Arc<T>, position: u64) -> Self {
        Self {
            rows: None,
            tracker,
            next_position: position,
            to_skip: 0,
        }
    }

    /// Position the next emitted row would be claimed at.
    #[must_use]
    pub fn next_position(&self) -> u64 {
        self.next_position
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<T> {
        &self.tracker
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.rows.is_none()
    }

    fn finish(&mut self) {
        if let Some(mut rows) = self.rows.take() {
            rows.close();
        }
    }

    /// Pull one row from the cursor, finishing the reader on exhaustion or error.
    fn pull(&mut self) -> Option<Result<Row, MysqlClientError>> {
        let pulled = self.rows.as_mut()?.next();
        match pulled {
            Some(Ok(row)) => Some(Ok(row)),
            other => {
                self.finish();
                other
            }
        }
    }
}

impl<C: Connection, T: RangeTracker + ?Sized> Iterator for RangeReader<C, T> {
    type Item = Result<Row, MysqlClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.to_skip > 0 {
            match self.pull()? {
                Ok(_) => self.to_skip -= 1,
                Err(err) => return Some(Err(err)),
            }
        }

        let position = self.next_position;
        if self.rows.is_none() || position >= self.tracker.stop_position() {
            self.finish();
            return None;
        }

        let row = match self.pull()? {
            Ok(row) => row,
            Err(err) => return Some(Err(err)),
        };
        if self.tracker.try_claim(position) {
            self.next_position += 1;
            Some(Ok(row))
        } else {
            debug!(position, "claim refused, stopping reader");
            self.finish();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MysqlConfig;
    use crate::test_utils::{MockConnector, MockEvent, explain_row};
    use crate::types::RowValues;

    fn source(connector: &MockConnector, strategy: OffsetStrategy) -> MysqlSource<MockConnector> {
        let client = MysqlClient::new(connector.clone(), MysqlConfig::new("h", "db", "u", "p"));
        MysqlSource::new(
            client,
            ReadOptions::new("SELECT id FROM t;").with_offset_strategy(strategy),
        )
        .unwrap()
    }

    fn ids(rows: Vec<Row>) -> Vec<i64> {
        rows.iter()
            .filter_map(|r| r.get("id").and_then(RowValues::as_i64))
            .collect()
    }

    #[test]
    fn rejects_non_select_query() {
        let client = MysqlClient::new(MockConnector::new(), MysqlConfig::new("h", "d", "u", "p"));
        assert!(MysqlSource::new(client, ReadOptions::new("DELETE FROM t")).is_err());
    }

    #[test]
    fn estimate_is_cached() {
        let connector = MockConnector::new().with_plan(vec![explain_row("PRIMARY", 9)]);
        let source = source(&connector, OffsetStrategy::SqlWindow);
        assert_eq!(source.estimate_size().unwrap(), 9);
        assert_eq!(source.estimate_size().unwrap(), 9);
        assert_eq!(connector.queries().len(), 1);
    }

    #[test]
    fn default_tracker_runs_to_end_of_results() {
        let connector = MockConnector::new().with_plan(vec![explain_row("SIMPLE", 30)]);
        let source = source(&connector, OffsetStrategy::SqlWindow);
        let tracker = source.get_range_tracker(None, None);
        assert_eq!(tracker.range(), OffsetRange::open_ended(0));
        let tracker = source.get_range_tracker(Some(5), Some(8));
        assert_eq!(tracker.range(), OffsetRange::new(5, 8));
        assert!(connector.queries().is_empty());
    }

    #[test]
    fn split_uses_estimate() {
        let connector = MockConnector::new().with_plan(vec![explain_row("PRIMARY", 25_000)]);
        let source = source(&connector, OffsetStrategy::SqlWindow);
        let plan = source.split(10, None, None).unwrap();
        assert_eq!(plan.chunk(), 2);
        assert_eq!(plan.count(), 12_500);
    }

    #[test]
    fn sql_window_scopes_query() {
        let connector = MockConnector::new().with_numbered_rows(3);
        let source = source(&connector, OffsetStrategy::SqlWindow);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::new(10, 13)));
        let rows: Vec<Row> = source
            .read(Arc::clone(&tracker))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            connector.queries(),
            vec!["SELECT * FROM (SELECT id FROM t) AS bounded LIMIT 10, 3".to_string()]
        );
        assert_eq!(tracker.last_claimed(), Some(12));
    }

    #[test]
    fn open_ended_window_has_no_row_cap() {
        let connector = MockConnector::new().with_numbered_rows(4);
        let source = source(&connector, OffsetStrategy::SqlWindow);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::open_ended(6)));
        assert_eq!(source.read(tracker).unwrap().count(), 4);
        assert_eq!(
            connector.queries(),
            vec![
                "SELECT * FROM (SELECT id FROM t) AS bounded LIMIT 6, 18446744073709551615"
                    .to_string()
            ]
        );
    }

    #[test]
    fn bundles_read_rows_beyond_an_under_counted_estimate() {
        let connector = MockConnector::new()
            .with_plan(vec![explain_row("PRIMARY", 5)])
            .with_numbered_rows(8);
        let source = source(&connector, OffsetStrategy::Skip);
        let mut seen = Vec::new();
        for bundle in source.split(1, None, None).unwrap() {
            let tracker = Arc::new(OffsetRangeTracker::new(bundle.range));
            seen.extend(ids(source.read(tracker).unwrap().collect::<Result<_, _>>().unwrap()));
        }
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn explicit_stop_keeps_last_bundle_closed() {
        let connector = MockConnector::new().with_plan(vec![explain_row("PRIMARY", 5)]);
        let source = source(&connector, OffsetStrategy::Skip);
        let last = source.split(1, None, Some(5)).unwrap().last().unwrap();
        assert_eq!(last.range, OffsetRange::new(4, 5));
    }

    #[test]
    fn skip_discards_leading_rows() {
        let connector = MockConnector::new().with_numbered_rows(10);
        let source = source(&connector, OffsetStrategy::Skip);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::new(4, 7)));
        let rows: Vec<Row> = source.read(tracker).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(ids(rows), vec![4, 5, 6]);
    }

    #[test]
    fn unscoped_reads_from_query_start() {
        let connector = MockConnector::new().with_numbered_rows(10);
        let source = source(&connector, OffsetStrategy::Unscoped);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::new(4, 7)));
        let rows: Vec<Row> = source.read(tracker).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(ids(rows), vec![0, 1, 2]);
    }

    #[test]
    fn stops_when_rows_run_out() {
        let connector = MockConnector::new().with_numbered_rows(2);
        let source = source(&connector, OffsetStrategy::Unscoped);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::new(0, 5)));
        let mut reader = source.read(Arc::clone(&tracker)).unwrap();
        assert_eq!(reader.by_ref().count(), 2);
        assert!(reader.is_finished());
        assert_eq!(connector.events().last(), Some(&MockEvent::Close));
    }

    #[test]
    fn split_mid_read_stops_reader_and_closes_session() {
        let connector = MockConnector::new().with_numbered_rows(100);
        let source = source(&connector, OffsetStrategy::Unscoped);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::new(0, 100)));
        let mut reader = source.read(Arc::clone(&tracker)).unwrap();
        let first: Vec<Row> = reader.by_ref().take(3).collect::<Result<_, _>>().unwrap();
        assert_eq!(first.len(), 3);
        assert!(tracker.try_split(5).is_some());
        let rest: Vec<Row> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(ids(rest), vec![3, 4]);
        assert!(reader.next().is_none());
        assert_eq!(connector.events().last(), Some(&MockEvent::Close));
    }

    #[test]
    fn empty_range_does_not_connect() {
        let connector = MockConnector::new().with_numbered_rows(3);
        let source = source(&connector, OffsetStrategy::SqlWindow);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::new(3, 3)));
        assert_eq!(source.read(tracker).unwrap().count(), 0);
        assert!(connector.events().is_empty());
    }

    #[test]
    fn fetch_error_is_surfaced_once() {
        let connector = MockConnector::new().with_numbered_rows(10).fail_fetch_after(1);
        let source = source(&connector, OffsetStrategy::Unscoped);
        let tracker = Arc::new(OffsetRangeTracker::new(OffsetRange::new(0, 10)));
        let results: Vec<_> = source.read(tracker).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(MysqlClientError::ExecutionError { .. })
        ));
    }
}
