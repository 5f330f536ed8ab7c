//! Core model and statement compilation for pitstore.
//!
//! Change messages describing point-in-time (PIT) entities are parsed into
//! [`Message`]s, reduced to [`PitChange`]s and compiled into SQL statements
//! for a PostGIS table keyed by `(id, dataset)`. Creates and updates become
//! idempotent upserts; deletes remove by key.
//!
//! This crate performs no I/O. Batches are applied through the
//! [`StatementSink`] trait, implemented for PostgreSQL in
//! `pitstore-postgis`.

#![forbid(unsafe_code)]

pub mod batch;
pub mod entity;
pub mod literal;
pub mod message;
pub mod query;
pub mod row;
pub mod table;

#[doc(hidden)]
pub mod test_support;

pub use batch::{BatchExecutor, BatchOutcome, BulkApplyError, CompiledBatch, StatementSink};
pub use entity::{DateRange, PitEntity};
pub use message::{Action, Message, MessageError, MessageMeta, PIT_KIND, PitChange};
pub use query::{QueryCompiler, Statement, StatementStyle};
pub use table::{DEFAULT_TABLE, TableName, TableNameError};
