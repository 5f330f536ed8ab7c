//! Error types produced by the PostGIS adapters.

use thiserror::Error;

/// Errors raised while talking to the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No pooled connection could be obtained. Never retried.
    #[error("failed to acquire a pooled connection: {source}")]
    ConnectionAcquisition {
        /// Pool failure.
        #[source]
        source: deadpool_postgres::PoolError,
    },
    /// A statement was rejected by the server.
    #[error("failed to {operation}: {}", server_message(.source))]
    StatementExecution {
        /// What was being attempted.
        operation: &'static str,
        /// Driver error.
        #[source]
        source: tokio_postgres::Error,
    },
    /// Opening a cursor or fetching one of its pages failed.
    #[error("query stream failed to {operation}: {}", server_message(.source))]
    Stream {
        /// Cursor step that failed.
        operation: &'static str,
        /// Driver error.
        #[source]
        source: tokio_postgres::Error,
    },
}

/// The server's own report when there is one; the driver only says `db error`.
fn server_message(source: &tokio_postgres::Error) -> String {
    source
        .as_db_error()
        .map_or_else(|| source.to_string(), ToString::to_string)
}

impl StoreError {
    pub(crate) fn statement(operation: &'static str) -> impl FnOnce(tokio_postgres::Error) -> Self {
        move |source| Self::StatementExecution { operation, source }
    }

    pub(crate) fn stream(operation: &'static str) -> impl FnOnce(tokio_postgres::Error) -> Self {
        move |source| Self::Stream { operation, source }
    }
}

/// Errors returned when a database URL cannot be used.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionUrlError {
    /// The URL did not parse as a PostgreSQL connection string.
    #[error("invalid database URL: {source}")]
    Parse {
        /// Parser error.
        #[source]
        source: tokio_postgres::Error,
    },
    /// The URL names a host kind other than TCP, such as a Unix socket.
    #[error("unsupported database host {host}")]
    UnsupportedHost {
        /// Debug rendering of the rejected host.
        host: String,
    },
}

/// Errors returned while building a connection pool.
#[derive(Debug, Error)]
#[error("failed to build connection pool: {source}")]
pub struct PoolBuildError {
    /// Pool builder failure.
    #[source]
    pub source: deadpool_postgres::BuildError,
}
