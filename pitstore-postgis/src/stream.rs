//! Cursor-backed streaming reads.
//!
//! [`QueryStream::open`] takes a pooled connection, starts a transaction and
//! declares a forward-only cursor over the caller's query. Rows are then
//! fetched one page at a time, only when the consumer asks for more.
//!
//! Connection release follows how the stream ends:
//! - exhaustion closes the cursor, commits and returns the connection to the
//!   pool;
//! - [`QueryStream::cancel`] closes the cursor, rolls back and returns the
//!   connection;
//! - dropping the stream early detaches the connection from the pool and
//!   closes it, which aborts the cursor on the server.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use deadpool_postgres::{Object, Pool};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream};
use log::{debug, warn};
use tokio_postgres::Row;

use crate::StoreError;
use crate::connection::{acquire, discard};

/// Rows fetched per round trip unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 100;

const CURSOR_NAME: &str = "pitstore_cursor";
const CLOSE_AND_COMMIT: &str = "CLOSE pitstore_cursor; COMMIT";
const CLOSE_AND_ROLLBACK: &str = "CLOSE pitstore_cursor; ROLLBACK";

/// Tuning for [`QueryStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    page_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StreamOptions {
    /// Fetch `page_size` rows per round trip; zero is treated as one.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Rows fetched per round trip.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Render the cursor declaration for `query`.
///
/// Trailing semicolons are stripped so the query can be embedded.
fn declare_sql(query: &str) -> String {
    let body = query.trim().trim_end_matches(';').trim_end();
    format!("DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {body}")
}

fn fetch_sql(page_size: usize) -> String {
    format!("FETCH FORWARD {page_size} FROM {CURSOR_NAME}")
}

/// A pooled connection holding an open cursor transaction.
///
/// Dropping a lease that still owns its connection discards the connection.
struct CursorLease {
    client: Option<Object>,
}

impl CursorLease {
    const fn new(client: Object) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Run `sql` and return the connection to the pool on success.
    async fn release(mut self, sql: &'static str) -> Result<(), StoreError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        match client.batch_execute(sql).await {
            Ok(()) => {
                debug!("query stream released its connection");
                Ok(())
            }
            Err(source) => {
                discard(client);
                Err(StoreError::Stream {
                    operation: "close cursor",
                    source,
                })
            }
        }
    }
}

impl Drop for CursorLease {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("query stream dropped before completion; discarding connection");
            discard(client);
        }
    }
}

type PageFuture = BoxFuture<'static, (CursorLease, Result<Vec<Row>, tokio_postgres::Error>)>;

enum State {
    Idle { lease: CursorLease, exhausted: bool },
    Fetching(PageFuture),
    Closing(BoxFuture<'static, Result<(), StoreError>>),
    Finished,
}

fn fetch_page(lease: CursorLease, sql: String) -> PageFuture {
    async move {
        let result = match lease.client.as_ref() {
            Some(client) => client.query(sql.as_str(), &[]).await,
            None => Ok(Vec::new()),
        };
        (lease, result)
    }
    .boxed()
}

/// Lazy sequence of rows produced by a server-side cursor.
///
/// Each stream owns one pooled connection for its whole life and cannot be
/// restarted; open another stream to read again.
pub struct QueryStream {
    state: State,
    buffer: VecDeque<Row>,
    fetch: String,
    page_size: usize,
}

impl std::fmt::Debug for QueryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStream")
            .field("buffered", &self.buffer.len())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl QueryStream {
    /// Declare a cursor over `query` on a connection taken from `pool`.
    ///
    /// Acquisition and declaration failures are reported here, before any
    /// row is produced.
    pub async fn open(
        pool: &Pool,
        query: &str,
        options: StreamOptions,
    ) -> Result<Self, StoreError> {
        let lease = CursorLease::new(acquire(pool).await?);
        if let Some(client) = lease.client.as_ref() {
            client
                .batch_execute("BEGIN")
                .await
                .map_err(StoreError::stream("begin cursor transaction"))?;
            client
                .batch_execute(&declare_sql(query))
                .await
                .map_err(StoreError::stream("declare cursor"))?;
        }
        debug!("query stream opened with page size {}", options.page_size());
        Ok(Self {
            state: State::Idle {
                lease,
                exhausted: false,
            },
            buffer: VecDeque::new(),
            fetch: fetch_sql(options.page_size()),
            page_size: options.page_size(),
        })
    }

    /// Stop reading, close the cursor and return the connection to the pool.
    ///
    /// A page fetch still in flight is abandoned and its connection
    /// discarded.
    pub async fn cancel(mut self) -> Result<(), StoreError> {
        self.buffer.clear();
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Idle { lease, .. } => {
                debug!("query stream cancelled");
                lease.release(CLOSE_AND_ROLLBACK).await
            }
            State::Closing(closing) => closing.await,
            State::Fetching(_) | State::Finished => Ok(()),
        }
    }
}

impl Stream for QueryStream {
    type Item = Result<Row, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(row) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(row)));
            }
            match std::mem::replace(&mut this.state, State::Finished) {
                State::Idle {
                    lease,
                    exhausted: false,
                } => this.state = State::Fetching(fetch_page(lease, this.fetch.clone())),
                State::Idle {
                    lease,
                    exhausted: true,
                } => {
                    this.state = State::Closing(lease.release(CLOSE_AND_COMMIT).boxed());
                }
                State::Fetching(mut page) => match page.poll_unpin(cx) {
                    Poll::Pending => {
                        this.state = State::Fetching(page);
                        return Poll::Pending;
                    }
                    Poll::Ready((lease, Ok(rows))) => {
                        let exhausted = rows.len() < this.page_size;
                        this.buffer.extend(rows);
                        this.state = State::Idle { lease, exhausted };
                    }
                    Poll::Ready((lease, Err(source))) => {
                        drop(lease);
                        return Poll::Ready(Some(Err(StoreError::Stream {
                            operation: "fetch rows",
                            source,
                        })));
                    }
                },
                State::Closing(mut closing) => match closing.poll_unpin(cx) {
                    Poll::Pending => {
                        this.state = State::Closing(closing);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(())) => return Poll::Ready(None),
                    Poll::Ready(Err(err)) => return Poll::Ready(Some(Err(err))),
                },
                State::Finished => return Poll::Ready(None),
            }
        }
    }
}
