//! The `query` subcommand: stream rows out as JSON lines.

use std::io::Write;

use clap::Parser;
use futures_util::StreamExt;
use pitstore_postgis::PitStore;

use crate::CliError;
use crate::connection::ConnectionArgs;

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser)]
#[command(
    long_about = "Run a read query through a server-side cursor and print \
                 each row as a JSON object on its own line. Rows are fetched \
                 in pages as output is written.",
    about = "Stream query results as JSON lines"
)]
pub(crate) struct QueryArgs {
    /// SQL query to run; its columns become the JSON object keys.
    #[arg(value_name = "sql")]
    pub(crate) sql: String,
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
}

impl QueryArgs {
    pub(crate) fn into_parts(self) -> Result<(ConnectionArgs, String), CliError> {
        let sql = json_rows_query(&self.sql).ok_or(CliError::EmptyQuery)?;
        Ok((self.connection, sql))
    }
}

/// Wrap `sql` so every row comes back as one JSON text column.
///
/// Returns `None` when nothing but whitespace and terminators remain.
pub(crate) fn json_rows_query(sql: &str) -> Option<String> {
    let body = sql.trim().trim_end_matches(';').trim_end();
    (!body.is_empty()).then(|| format!("SELECT row_to_json(q)::text FROM ({body}) q"))
}

/// Stream `sql` through `store`, writing each JSON row to `out`.
pub(crate) async fn stream_json_rows(
    store: &PitStore,
    sql: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut rows = store.open_stream(sql).await?;
    while let Some(row) = rows.next().await {
        let json: String = row?.try_get(0).map_err(CliError::DecodeRow)?;
        if let Err(source) = writeln!(out, "{json}") {
            rows.cancel().await?;
            return Err(CliError::WriteOutput(source));
        }
    }
    out.flush().map_err(CliError::WriteOutput)
}
