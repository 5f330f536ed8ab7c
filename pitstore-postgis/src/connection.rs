//! Pooled connection helpers shared by the sink, reads and schema glue.
//!
//! Writers run inside a [`Transaction`]. A connection leaves a transaction
//! either through [`Transaction::finish`] or by being detached from the pool,
//! so an open transaction can never be handed to the next caller, even when
//! the writing future is dropped mid-flight.

use deadpool_postgres::{Object, Pool};
use log::warn;
use tokio_postgres::types::ToSql;

use crate::StoreError;

pub(crate) async fn acquire(pool: &Pool) -> Result<Object, StoreError> {
    pool.get()
        .await
        .map_err(|source| StoreError::ConnectionAcquisition { source })
}

/// A pooled connection between `BEGIN` and `COMMIT`/`ROLLBACK`.
///
/// Dropping it before [`Transaction::finish`] completes discards the
/// connection; the server then aborts the transaction.
pub(crate) struct Transaction {
    client: Option<Object>,
}

impl Transaction {
    /// Take a connection from `pool` and open a transaction on it.
    pub(crate) async fn begin(pool: &Pool) -> Result<Self, StoreError> {
        let mut transaction = Self { client: None };
        let client = transaction.client.insert(acquire(pool).await?);
        client
            .batch_execute("BEGIN")
            .await
            .map_err(StoreError::statement("begin transaction"))?;
        Ok(transaction)
    }

    /// Run one or more statements without parameters.
    pub(crate) async fn batch_execute(
        &self,
        sql: &str,
        operation: &'static str,
    ) -> Result<(), StoreError> {
        match self.client.as_ref() {
            Some(client) => client
                .batch_execute(sql)
                .await
                .map_err(StoreError::statement(operation)),
            None => Ok(()),
        }
    }

    /// Run one statement with bound parameters.
    pub(crate) async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        operation: &'static str,
    ) -> Result<u64, StoreError> {
        match self.client.as_ref() {
            Some(client) => client
                .execute(sql, params)
                .await
                .map_err(StoreError::statement(operation)),
            None => Ok(0),
        }
    }

    /// Commit on success; otherwise roll back and hand back the original error.
    ///
    /// The connection returns to the pool only once the transaction has
    /// ended on the server.
    pub(crate) async fn finish<T>(
        mut self,
        outcome: Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let end = if outcome.is_ok() { "COMMIT" } else { "ROLLBACK" };
        let ended = match self.client.as_ref() {
            Some(client) => client.batch_execute(end).await,
            None => Ok(()),
        };
        match (outcome, ended) {
            (Ok(value), Ok(())) => {
                drop(self.client.take());
                Ok(value)
            }
            (Ok(_), Err(source)) => {
                self.abandon();
                Err(StoreError::StatementExecution {
                    operation: "commit transaction",
                    source,
                })
            }
            (Err(err), Ok(())) => {
                drop(self.client.take());
                Err(err)
            }
            (Err(err), Err(rollback)) => {
                warn!("rollback failed, discarding connection: {rollback}");
                self.abandon();
                Err(err)
            }
        }
    }

    fn abandon(&mut self) {
        if let Some(client) = self.client.take() {
            discard(client);
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.client.is_some() {
            warn!("transaction abandoned before completion; discarding connection");
            self.abandon();
        }
    }
}

/// Close `client` instead of returning it to the pool.
pub(crate) fn discard(client: Object) {
    drop(Object::take(client));
}
