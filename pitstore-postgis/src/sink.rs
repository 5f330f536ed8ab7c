//! Transactional [`StatementSink`] backed by a connection pool.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use pitstore_core::{CompiledBatch, StatementSink, StatementStyle};
use tokio_postgres::types::ToSql;

use crate::StoreError;
use crate::connection::Transaction;

/// Applies each batch inside one explicit transaction.
///
/// Inline batches travel as a single multi-statement text; bound batches run
/// statement by statement with their parameters. The first failure rolls the
/// whole batch back. If the returned future is dropped before the
/// transaction ends, the connection is closed rather than pooled.
#[derive(Debug, Clone)]
pub struct PgStatementSink {
    pool: Pool,
}

impl PgStatementSink {
    /// Sink drawing connections from `pool`.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// The injected pool.
    #[must_use]
    pub const fn pool(&self) -> &Pool {
        &self.pool
    }
}

async fn apply(transaction: &Transaction, batch: &CompiledBatch) -> Result<(), StoreError> {
    match batch.style() {
        StatementStyle::Inline => {
            transaction
                .batch_execute(&batch.joined_sql(), "apply inline batch")
                .await
        }
        StatementStyle::Bound => {
            for statement in batch.statements() {
                let params: Vec<&(dyn ToSql + Sync)> = statement
                    .params()
                    .iter()
                    .map(|param| param as &(dyn ToSql + Sync))
                    .collect();
                transaction
                    .execute(statement.sql(), &params, "apply bound statement")
                    .await?;
            }
            Ok(())
        }
    }
}

#[async_trait]
impl StatementSink for PgStatementSink {
    type Error = StoreError;

    async fn execute(&self, batch: &CompiledBatch) -> Result<(), Self::Error> {
        let transaction = Transaction::begin(&self.pool).await?;
        let outcome = apply(&transaction, batch).await;
        transaction.finish(outcome).await
    }
}
