//! A single handle bundling every store operation over one pool.

use deadpool_postgres::Pool;
use pitstore_core::{
    BatchExecutor, BatchOutcome, BulkApplyError, Message, QueryCompiler, StatementStyle,
    TableName,
};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::{PgStatementSink, QueryStream, StoreError, StreamOptions, schema};

/// PostGIS-backed PIT store.
///
/// # Examples
/// ```no_run
/// use futures_util::TryStreamExt;
/// use pitstore_core::{Action, Message, PIT_KIND, TableName};
/// use pitstore_postgis::{ConnectionDescriptor, PitStore};
/// use serde_json::json;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = ConnectionDescriptor::default().create_pool(4)?;
/// let store = PitStore::new(pool, TableName::default());
/// store.bootstrap().await?;
/// store
///     .bulk_apply(&[Message::new(
///         Action::Create,
///         PIT_KIND,
///         "d1",
///         json!({"id": "a1", "type": "hg:Place"}),
///     )])
///     .await?;
/// let rows: Vec<_> = store.open_stream("SELECT id FROM pits").await?.try_collect().await?;
/// assert_eq!(rows.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PitStore {
    pool: Pool,
    executor: BatchExecutor<PgStatementSink>,
    stream_options: StreamOptions,
}

impl PitStore {
    /// Store writing to `table` with bound parameters.
    #[must_use]
    pub fn new(pool: Pool, table: TableName) -> Self {
        Self::with_compiler(pool, QueryCompiler::new(table, StatementStyle::Bound))
    }

    /// Store using an explicit compiler.
    #[must_use]
    pub fn with_compiler(pool: Pool, compiler: QueryCompiler) -> Self {
        Self {
            executor: BatchExecutor::with_compiler(PgStatementSink::new(pool.clone()), compiler),
            pool,
            stream_options: StreamOptions::default(),
        }
    }

    /// Replace the options used by [`PitStore::open_stream`].
    #[must_use]
    pub const fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.stream_options = options;
        self
    }

    /// The injected pool.
    #[must_use]
    pub const fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Executor applying batches through this store's sink.
    #[must_use]
    pub const fn executor(&self) -> &BatchExecutor<PgStatementSink> {
        &self.executor
    }

    /// Target table.
    #[must_use]
    pub const fn table(&self) -> &TableName {
        self.executor.compiler().table()
    }

    /// Persist every PIT message in `messages` in one transaction.
    pub async fn bulk_apply(
        &self,
        messages: &[Message],
    ) -> Result<BatchOutcome, BulkApplyError<StoreError>> {
        self.executor.bulk_apply(messages).await
    }

    /// Run a read query and collect every row.
    pub async fn execute_read(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, StoreError> {
        crate::execute_read(&self.pool, query, params).await
    }

    /// Stream the rows of `query` through a server-side cursor.
    pub async fn open_stream(&self, query: &str) -> Result<QueryStream, StoreError> {
        QueryStream::open(&self.pool, query, self.stream_options).await
    }

    /// Create the table and its indexes if missing.
    pub async fn bootstrap(&self) -> Result<bool, StoreError> {
        schema::bootstrap(&self.pool, self.table()).await
    }

    /// Remove every row from the table.
    pub async fn truncate(&self) -> Result<(), StoreError> {
        schema::truncate(&self.pool, self.table()).await
    }
}
