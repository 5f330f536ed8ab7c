//! Command-line interface for loading and reading PIT tables.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use log::info;
use pitstore_postgis::PitStore;
use tracing_subscriber::EnvFilter;

mod apply;
mod connection;
mod error;
mod query;

pub use error::CliError;

use apply::ApplyArgs;
use connection::ConnectionArgs;
use query::QueryArgs;

const ARG_DATABASE_URL: &str = "database-url";
const ARG_HOST: &str = "host";
const ARG_PORT: &str = "port";
const ARG_USER: &str = "user";
const ARG_PASSWORD: &str = "password";
const ARG_DATABASE: &str = "database";
const ARG_POOL_SIZE: &str = "pool-size";
const ARG_TABLE: &str = "table";
const ARG_BATCH_SIZE: &str = "batch-size";
const ARG_INPUT: &str = "input";

const DEFAULT_LOG_FILTER: &str = "pitstore_cli=info,pitstore_core=info,pitstore_postgis=info";

/// Run the CLI with the current process arguments and environment.
///
/// Command output goes to standard output; logs go to standard error.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.verbose);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(dispatch(cli.command, &mut stdout))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn dispatch(command: Command, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Command::Init(args) => {
            let store = open_store(args.connection)?;
            let created = store.bootstrap().await?;
            let table = store.table();
            if created {
                writeln!(out, "created table {table}").map_err(CliError::WriteOutput)
            } else {
                writeln!(out, "table {table} already exists").map_err(CliError::WriteOutput)
            }
        }
        Command::Truncate(args) => {
            let store = open_store(args.connection)?;
            store.truncate().await?;
            writeln!(out, "truncated table {}", store.table()).map_err(CliError::WriteOutput)
        }
        Command::Apply(args) => {
            let (connection, plan) = args.into_plan()?;
            let store = open_store(connection)?;
            let summary = plan.run(store.executor()).await?;
            info!(
                "applied {} statements from {} messages in {} batches",
                summary.applied, summary.received, summary.batches
            );
            writeln!(
                out,
                "applied {} statements from {} messages",
                summary.applied, summary.received
            )
            .map_err(CliError::WriteOutput)
        }
        Command::Query(args) => {
            let (connection, sql) = args.into_parts()?;
            let store = open_store(connection)?;
            query::stream_json_rows(&store, &sql, out).await
        }
    }
}

fn open_store(args: ConnectionArgs) -> Result<PitStore, CliError> {
    args.into_config()?.into_store()
}

#[derive(Debug, Parser)]
#[command(
    name = "pitstore",
    about = "Load change messages into a PostGIS PIT table and read it back",
    version
)]
struct Cli {
    /// Log at debug level regardless of `RUST_LOG`.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the PIT table and its indexes if missing.
    Init(ConnectionOnlyArgs),
    /// Remove every row from the PIT table.
    Truncate(ConnectionOnlyArgs),
    /// Apply newline-delimited JSON change messages from a file.
    Apply(ApplyArgs),
    /// Stream a read query, printing one JSON object per row.
    Query(QueryArgs),
}

/// Arguments for commands that only need a connection.
#[derive(Debug, Clone, clap::Args)]
struct ConnectionOnlyArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[cfg(test)]
mod tests;
