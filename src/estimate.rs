//! Rough row-count estimation from MySQL `EXPLAIN` output.
//!
//! `EXPLAIN SELECT * FROM (<query>) AS subq` yields one planner row per table
//! access. The wrapped query itself is reported with `select_type = DERIVED`;
//! the outer access is `PRIMARY` (or `SIMPLE` when the optimizer merged the
//! derived table) and its `rows` column is the estimate. A merged join reports
//! one `SIMPLE` row per table; the last one reported is used.

use crate::error::MysqlClientError;
use crate::results::Row;

const SELECT_TYPE: &str = "select_type";
const ROWS: &str = "rows";

fn is_count_candidate(row: &Row) -> bool {
    let select_type = row.get(SELECT_TYPE).and_then(|v| v.as_text());
    select_type == Some("PRIMARY") || select_type == Some("SIMPLE")
}

/// The `rows` value of the last `PRIMARY`/`SIMPLE` planner row, or 0 if none reports one.
#[must_use]
pub fn estimate_from_plan(plan: &[Row]) -> i64 {
    plan.iter()
        .rev()
        .find(|row| is_count_candidate(row))
        .and_then(|row| row.get(ROWS))
        .and_then(|rows| rows.as_i64())
        .unwrap_or(0)
}

/// Estimate from planner rows, rejecting non-positive results.
///
/// # Errors
/// Returns `MysqlClientError::EstimationError` carrying `explain_query` when the estimate is `<= 0`.
pub fn checked_estimate(plan: &[Row], explain_query: &str) -> Result<u64, MysqlClientError> {
    let estimate = estimate_from_plan(plan);
    u64::try_from(estimate)
        .ok()
        .filter(|total| *total > 0)
        .ok_or_else(|| MysqlClientError::EstimationError {
            query: explain_query.to_string(),
            estimate,
        })
}
