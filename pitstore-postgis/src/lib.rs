//! PostgreSQL/PostGIS adapters for the PIT store.
//!
//! Responsibilities:
//! - Build connection pools from descriptors or URLs.
//! - Apply compiled batches transactionally through [`PgStatementSink`].
//! - Serve reads, either collected ([`execute_read`]) or streamed through a
//!   server-side cursor ([`QueryStream`]).
//! - Bootstrap and truncate the PIT table.
//!
//! Boundaries:
//! - Statement text comes from `pitstore-core`; nothing here renders entity
//!   values.
//! - The pool is always injected; no connection string is global.
//!
//! Invariants:
//! - A connection with an open transaction never returns to the pool.

#![forbid(unsafe_code)]

mod config;
mod connection;
mod error;
mod read;
pub mod schema;
mod sink;
mod store;
mod stream;

pub use config::{ConnectionDescriptor, DATABASE_URL_ENV, DEFAULT_POOL_SIZE};
pub use deadpool_postgres::Pool;
pub use error::{ConnectionUrlError, PoolBuildError, StoreError};
pub use read::execute_read;
pub use sink::PgStatementSink;
pub use store::PitStore;
pub use stream::{DEFAULT_PAGE_SIZE, QueryStream, StreamOptions};
pub use tokio_postgres::Row;
