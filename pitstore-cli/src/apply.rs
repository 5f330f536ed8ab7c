//! The `apply` subcommand: newline-delimited JSON messages into the store.
//!
//! The input is read lazily and applied in fixed-size batches, each in its
//! own transaction. A malformed line stops the run before its batch is sent;
//! batches already applied stay applied.

use std::io::BufRead;
use std::num::NonZeroUsize;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use pitstore_core::{BatchExecutor, Message, StatementSink};

use crate::connection::ConnectionArgs;
use crate::{ARG_BATCH_SIZE, ARG_INPUT, CliError};

/// Messages per transaction unless `--batch-size` says otherwise.
pub(crate) const DEFAULT_BATCH_SIZE: usize = 500;

/// CLI arguments for the `apply` subcommand.
#[derive(Debug, Clone, Parser)]
#[command(
    long_about = "Read change messages, one JSON object per line, and apply \
                 the PIT messages among them. Messages of other kinds are \
                 skipped. Each batch runs in its own transaction.",
    about = "Apply change messages from a file"
)]
pub(crate) struct ApplyArgs {
    /// Path to a newline-delimited JSON file of change messages.
    #[arg(value_name = "path")]
    pub(crate) input: Utf8PathBuf,
    /// Messages applied per transaction.
    #[arg(long = ARG_BATCH_SIZE, value_name = "count", default_value_t = default_batch_size())]
    pub(crate) batch_size: NonZeroUsize,
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
}

const fn default_batch_size() -> NonZeroUsize {
    match NonZeroUsize::new(DEFAULT_BATCH_SIZE) {
        Some(size) => size,
        None => NonZeroUsize::MIN,
    }
}

impl ApplyArgs {
    /// Validate the input path and split off the connection options.
    pub(crate) fn into_plan(self) -> Result<(ConnectionArgs, ApplyPlan), CliError> {
        require_file(&self.input)?;
        Ok((
            self.connection,
            ApplyPlan {
                input: self.input,
                batch_size: self.batch_size,
            },
        ))
    }
}

fn require_file(path: &Utf8Path) -> Result<(), CliError> {
    match pitstore_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field: ARG_INPUT,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field: ARG_INPUT,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field: ARG_INPUT,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A validated input file and batch size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApplyPlan {
    pub(crate) input: Utf8PathBuf,
    pub(crate) batch_size: NonZeroUsize,
}

/// Totals across every batch of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ApplySummary {
    pub(crate) batches: usize,
    pub(crate) received: usize,
    pub(crate) applied: usize,
}

impl ApplyPlan {
    /// Read the input file and apply it through `executor`.
    pub(crate) async fn run<S: StatementSink>(
        &self,
        executor: &BatchExecutor<S>,
    ) -> Result<ApplySummary, CliError> {
        let reader = pitstore_fs::open_buffered(&self.input).map_err(|source| {
            CliError::OpenInput {
                path: self.input.clone(),
                source,
            }
        })?;
        apply_batches(
            executor,
            MessageBatches::new(reader, &self.input, self.batch_size),
        )
        .await
    }
}

/// Apply each batch in turn, stopping at the first failure.
pub(crate) async fn apply_batches<S, I>(
    executor: &BatchExecutor<S>,
    batches: I,
) -> Result<ApplySummary, CliError>
where
    S: StatementSink,
    I: IntoIterator<Item = Result<Batch, CliError>>,
{
    let mut summary = ApplySummary::default();
    for batch in batches {
        let batch = batch?;
        let outcome = executor
            .bulk_apply(&batch.messages)
            .await
            .map_err(|source| CliError::ApplyBatch {
                first_line: batch.first_line,
                source: Box::new(source),
            })?;
        summary.batches += 1;
        summary.received += outcome.received;
        summary.applied += outcome.applied;
    }
    Ok(summary)
}

/// Messages read from consecutive input lines.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Batch {
    /// One-based line number of the first message.
    pub(crate) first_line: usize,
    pub(crate) messages: Vec<Message>,
}

/// Splits a newline-delimited JSON reader into message batches.
///
/// Blank lines are skipped. Errors carry the one-based line number.
pub(crate) struct MessageBatches<R> {
    lines: std::iter::Enumerate<std::io::Lines<R>>,
    path: Utf8PathBuf,
    batch_size: NonZeroUsize,
    failed: bool,
}

impl<R: BufRead> MessageBatches<R> {
    pub(crate) fn new(reader: R, path: &Utf8Path, batch_size: NonZeroUsize) -> Self {
        Self {
            lines: reader.lines().enumerate(),
            path: path.to_path_buf(),
            batch_size,
            failed: false,
        }
    }

    fn parse_line(&self, index: usize, line: std::io::Result<String>) -> Result<Option<Message>, CliError> {
        let line_number = index + 1;
        let text = line.map_err(|source| CliError::ReadInput {
            path: self.path.clone(),
            line: line_number,
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Message::from_json(&text)
            .map(Some)
            .map_err(|source| CliError::ParseMessage {
                path: self.path.clone(),
                line: line_number,
                source,
            })
    }
}

impl<R: BufRead> Iterator for MessageBatches<R> {
    type Item = Result<Batch, CliError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut batch: Option<Batch> = None;
        while let Some((index, line)) = self.lines.next() {
            match self.parse_line(index, line) {
                Ok(None) => {}
                Ok(Some(message)) => {
                    let current = batch.get_or_insert_with(|| Batch {
                        first_line: index + 1,
                        messages: Vec::with_capacity(self.batch_size.get()),
                    });
                    current.messages.push(message);
                    if current.messages.len() == self.batch_size.get() {
                        break;
                    }
                }
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        batch.map(Ok)
    }
}
