use crate::error::MysqlClientError;

/// Leading keyword a statement must carry for the operation it is passed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Reads (`SELECT ...`)
    Select,
    /// Loads (`INSERT ...`)
    Insert,
}

impl StatementKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
        }
    }
}

/// Check that `query`, ignoring leading whitespace, starts with the keyword for `kind`.
///
/// The comparison is case-insensitive.
///
/// # Errors
/// Returns `MysqlClientError::QueryValidationError` when the prefix does not match.
pub fn validate_query(query: &str, kind: StatementKind) -> Result<(), MysqlClientError> {
    let trimmed = query.trim_start();
    let keyword = kind.keyword();
    let matches = trimmed
        .get(..keyword.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword));
    if matches {
        Ok(())
    } else {
        Err(MysqlClientError::QueryValidationError {
            expected: keyword,
            query: trimmed.to_string(),
        })
    }
}

/// Strip trailing whitespace and statement terminators so the query can be nested.
#[must_use]
pub fn cleanse_query(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

/// Planner statement used for the rough count estimate.
#[must_use]
pub fn explain_query(query: &str) -> String {
    format!("EXPLAIN SELECT * FROM ({}) AS subq", cleanse_query(query))
}

/// Restrict `query` to the rows at positions `[start, start + count)`.
#[must_use]
pub fn window_query(query: &str, start: u64, count: u64) -> String {
    format!(
        "SELECT * FROM ({}) AS bounded LIMIT {start}, {count}",
        cleanse_query(query)
    )
}

/// Build the positional INSERT (optionally upsert) for `columns` of `database.table`.
///
/// ```rust
/// use mysql_bounded_io::query::build_insert_statement;
///
/// let sql = build_insert_statement("db", "users", &["id".into(), "name".into()], true);
/// assert_eq!(
///     sql,
///     "INSERT INTO db.users (id, name) VALUES (?, ?) \
///      ON DUPLICATE KEY UPDATE id = VALUES(id), name = VALUES(name)"
/// );
/// ```
#[must_use]
pub fn build_insert_statement(
    database: &str,
    table: &str,
    columns: &[String],
    do_upsert: bool,
) -> String {
    let column_list = columns.join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut statement =
        format!("INSERT INTO {database}.{table} ({column_list}) VALUES ({placeholders})");
    if do_upsert {
        let updates = columns
            .iter()
            .map(|col| format!("{col} = VALUES({col})"))
            .collect::<Vec<_>>()
            .join(", ");
        statement.push_str(" ON DUPLICATE KEY UPDATE ");
        statement.push_str(&updates);
    }
    statement
}
