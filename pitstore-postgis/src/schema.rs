//! Table bootstrap and truncation.
//!
//! Bootstrap is idempotent: the catalogue is checked first and the table is
//! only created when missing. Creation of the table and all its indexes runs
//! in one transaction, so a failure leaves nothing behind.

use deadpool_postgres::{Object, Pool};
use log::info;
use pitstore_core::TableName;

use crate::StoreError;
use crate::connection::{Transaction, acquire};

/// Statements creating `table` and its indexes, in execution order.
///
/// Column names are left unquoted, so the server folds them to lowercase
/// (`validSince` becomes `validsince`).
#[must_use]
pub fn create_statements(table: &TableName) -> Vec<(&'static str, String)> {
    vec![
        (
            "create table",
            format!(
                "CREATE TABLE {table} (\
                 id text NOT NULL, \
                 dataset text NOT NULL, \
                 name text, \
                 type text, \
                 validSince daterange, \
                 validUntil daterange, \
                 data jsonb, \
                 geometry geometry, \
                 CONSTRAINT {pkey} PRIMARY KEY (id, dataset))",
                pkey = table.index_name("pkey"),
            ),
        ),
        (
            "create geometry index",
            format!(
                "CREATE INDEX {} ON {table} USING GIST (geometry)",
                table.index_name("gix")
            ),
        ),
        (
            "create dataset index",
            format!(
                "CREATE INDEX {} ON {table} (dataset)",
                table.index_name("dataset")
            ),
        ),
        (
            "create type index",
            format!("CREATE INDEX {} ON {table} (type)", table.index_name("type")),
        ),
        (
            "create id index",
            format!("CREATE INDEX {} ON {table} (id)", table.index_name("id")),
        ),
    ]
}

async fn table_exists(client: &Object, table: &TableName) -> Result<bool, StoreError> {
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_tables \
             WHERE schemaname = 'public' AND tablename = $1::text)",
            &[&table.as_str()],
        )
        .await
        .map_err(StoreError::statement("check table existence"))?;
    row.try_get(0)
        .map_err(StoreError::statement("read table existence"))
}

async fn create(transaction: &Transaction, table: &TableName) -> Result<(), StoreError> {
    for (operation, sql) in create_statements(table) {
        transaction.batch_execute(&sql, operation).await?;
    }
    Ok(())
}

/// Create `table` in the `public` schema unless it already exists.
///
/// Returns `true` when the table was created by this call.
pub async fn bootstrap(pool: &Pool, table: &TableName) -> Result<bool, StoreError> {
    if table_exists(&acquire(pool).await?, table).await? {
        return Ok(false);
    }
    let transaction = Transaction::begin(pool).await?;
    let outcome = create(&transaction, table).await;
    transaction.finish(outcome).await?;
    info!("created table {table} with its indexes");
    Ok(true)
}

/// Remove every row from `table`.
pub async fn truncate(pool: &Pool, table: &TableName) -> Result<(), StoreError> {
    let client = acquire(pool).await?;
    client
        .batch_execute(&format!("TRUNCATE TABLE {table}"))
        .await
        .map_err(StoreError::statement("truncate table"))?;
    info!("truncated table {table}");
    Ok(())
}
