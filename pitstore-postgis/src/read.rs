//! One-shot reads returning every row at once.

use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::StoreError;
use crate::connection::acquire;

/// Run `query` with bound `params` and collect all rows.
///
/// The connection goes back to the pool on every exit path.
///
/// # Examples
/// ```no_run
/// use pitstore_postgis::{ConnectionDescriptor, execute_read};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = ConnectionDescriptor::default().create_pool(4)?;
/// let rows = execute_read(&pool, "SELECT id FROM pits WHERE dataset = $1", &[&"d1"]).await?;
/// for row in rows {
///     let id: String = row.try_get("id")?;
///     println!("{id}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn execute_read(
    pool: &Pool,
    query: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<Row>, StoreError> {
    let client = acquire(pool).await?;
    client
        .query(query, params)
        .await
        .map_err(StoreError::statement("execute read"))
}
