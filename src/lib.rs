//! Facade crate for the pitstore PIT loader.
//!
//! This crate re-exports the core message and statement types and, behind the
//! `postgis` feature, the PostgreSQL-backed store.

#![forbid(unsafe_code)]

pub use pitstore_core::{
    Action, BatchExecutor, BatchOutcome, BulkApplyError, CompiledBatch, DEFAULT_TABLE, DateRange,
    Message, MessageError, MessageMeta, PIT_KIND, PitChange, PitEntity, QueryCompiler, Statement,
    StatementSink, StatementStyle, TableName, TableNameError,
};

#[cfg(feature = "postgis")]
pub use pitstore_postgis::{
    ConnectionDescriptor, ConnectionUrlError, PgStatementSink, PitStore, PoolBuildError,
    QueryStream, StoreError, StreamOptions, execute_read,
};
