//! Error types emitted by the PIT store CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use pitstore_core::{MessageError, TableNameError};
use pitstore_postgis::{ConnectionUrlError, PoolBuildError, StoreError};
use thiserror::Error;

/// Errors emitted by the PIT store CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// The configured table name is not a plain identifier.
    #[error("invalid table name: {0}")]
    InvalidTable(#[from] TableNameError),
    /// The configured database URL could not be used.
    #[error(transparent)]
    DatabaseUrl(#[from] ConnectionUrlError),
    /// The connection pool could not be built.
    #[error(transparent)]
    BuildPool(#[from] PoolBuildError),
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the message file failed.
    #[error("failed to open {path:?}: {source}")]
    OpenInput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading a line of the message file failed.
    #[error("failed to read {path:?} at line {line}: {source}")]
    ReadInput {
        path: Utf8PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },
    /// A line of the message file is not a valid change message.
    #[error("invalid message in {path:?} at line {line}: {source}")]
    ParseMessage {
        path: Utf8PathBuf,
        line: usize,
        #[source]
        source: MessageError,
    },
    /// A batch failed and was rolled back.
    #[error("failed to apply batch starting at line {first_line}: {source}")]
    ApplyBatch {
        first_line: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The query was empty once terminators were stripped.
    #[error("query must not be empty")]
    EmptyQuery,
    /// A streamed row did not hold a JSON text column.
    #[error("failed to decode query row: {0}")]
    DecodeRow(#[source] tokio_postgres::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
