//! Batch execution of change messages.
//!
//! [`BatchExecutor`] filters a batch down to PIT messages, compiles each one
//! and hands the whole set to a [`StatementSink`] in a single call. Sinks
//! own transactional behaviour; the executor never retries and never reports
//! partial success.

use async_trait::async_trait;
use log::info;
use thiserror::Error;

use crate::query::{QueryCompiler, Statement, StatementStyle};
use crate::{Message, MessageError, PitChange};

/// Statements compiled from one batch of messages, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBatch {
    style: StatementStyle,
    statements: Vec<Statement>,
}

impl CompiledBatch {
    /// Style every statement was compiled in.
    #[must_use]
    pub const fn style(&self) -> StatementStyle {
        self.style
    }

    /// Statements in input order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the batch compiled to nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// All statement texts joined by newlines.
    ///
    /// Only meaningful for inline batches, whose statements carry no
    /// parameters.
    #[must_use]
    pub fn joined_sql(&self) -> String {
        self.statements
            .iter()
            .map(Statement::sql)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Destination for compiled batches.
///
/// Implementations must apply the batch all-or-nothing and in order.
#[async_trait]
pub trait StatementSink: Send + Sync {
    /// Error returned when the batch could not be applied.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply every statement in `batch`.
    async fn execute(&self, batch: &CompiledBatch) -> Result<(), Self::Error>;
}

/// Summary of a successful [`BatchExecutor::bulk_apply`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Messages in the input batch, whatever their kind.
    pub received: usize,
    /// Statements sent to the sink.
    pub applied: usize,
}

/// Errors returned by [`BatchExecutor::bulk_apply`].
#[derive(Debug, Error)]
pub enum BulkApplyError<E: std::error::Error + 'static> {
    /// A PIT message could not be interpreted; nothing was sent.
    #[error(transparent)]
    Message(#[from] MessageError),
    /// The sink rejected the batch.
    #[error("failed to apply batch: {0}")]
    Sink(#[source] E),
}

/// Compiles message batches and applies them through a sink.
///
/// # Examples
/// ```
/// use pitstore_core::{Action, BatchExecutor, Message, PIT_KIND};
/// use serde_json::json;
///
/// // Compilation needs no sink; `bulk_apply` requires a `StatementSink`.
/// let executor = BatchExecutor::new(());
/// let messages = [
///     Message::new(Action::Create, PIT_KIND, "d1", json!({"id": "a1", "type": "x"})),
///     Message::new(Action::Create, "relation", "d1", json!({})),
/// ];
/// let batch = executor.compile(&messages)?;
/// assert_eq!(batch.len(), 1);
/// # Ok::<(), pitstore_core::MessageError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BatchExecutor<S> {
    sink: S,
    compiler: QueryCompiler,
}

impl<S> BatchExecutor<S> {
    /// Executor writing to the default table with bound parameters.
    pub fn new(sink: S) -> Self {
        Self::with_compiler(sink, QueryCompiler::default())
    }

    /// Executor using an explicit compiler.
    pub const fn with_compiler(sink: S, compiler: QueryCompiler) -> Self {
        Self { sink, compiler }
    }

    /// The underlying sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// The compiler in use.
    pub const fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    /// Compile the PIT messages in `messages`, skipping other kinds.
    pub fn compile(&self, messages: &[Message]) -> Result<CompiledBatch, MessageError> {
        let mut statements = Vec::with_capacity(messages.len());
        for message in messages {
            if let Some(change) = PitChange::from_message(message)? {
                statements.push(self.compiler.compile(&change));
            }
        }
        Ok(CompiledBatch {
            style: self.compiler.style(),
            statements,
        })
    }
}

impl<S: StatementSink> BatchExecutor<S> {
    /// Persist every PIT message in `messages` as one unit.
    ///
    /// A batch without PIT messages succeeds without touching the sink.
    pub async fn bulk_apply(
        &self,
        messages: &[Message],
    ) -> Result<BatchOutcome, BulkApplyError<S::Error>> {
        let batch = self.compile(messages)?;
        let outcome = BatchOutcome {
            received: messages.len(),
            applied: batch.len(),
        };
        if batch.is_empty() {
            return Ok(outcome);
        }

        self.sink
            .execute(&batch)
            .await
            .map_err(BulkApplyError::Sink)?;
        info!(
            "applied batch of {} messages ({} statements)",
            outcome.received, outcome.applied
        );
        Ok(outcome)
    }
}
