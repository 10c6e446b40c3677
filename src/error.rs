use thiserror::Error;

/// Error produced by a database driver behind the [`Connection`](crate::session::Connection) seam.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum MysqlClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Query expected to start with {expected} statement. Query: {query}")]
    QueryValidationError { expected: &'static str, query: String },

    #[error("Failed to connect mysql: {source}")]
    ConnectionError {
        #[source]
        source: DriverError,
    },

    #[error("Failed to execute query: {query}, cause: {source}")]
    ExecutionError {
        query: String,
        #[source]
        source: DriverError,
    },

    #[error("Failed to estimate total number of records (estimate {estimate}). Query: {query}")]
    EstimationError { query: String, estimate: i64 },
}

impl MysqlClientError {
    pub(crate) fn execution(query: impl Into<String>, source: impl Into<DriverError>) -> Self {
        MysqlClientError::ExecutionError {
            query: query.into(),
            source: source.into(),
        }
    }

    pub(crate) fn connection(source: impl Into<DriverError>) -> Self {
        MysqlClientError::ConnectionError {
            source: source.into(),
        }
    }

    /// The statement text attached to the error, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        match self {
            MysqlClientError::QueryValidationError { query, .. }
            | MysqlClientError::ExecutionError { query, .. }
            | MysqlClientError::EstimationError { query, .. } => Some(query),
            MysqlClientError::ConfigError(_) | MysqlClientError::ConnectionError { .. } => None,
        }
    }
}
