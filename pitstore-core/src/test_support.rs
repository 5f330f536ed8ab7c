//! Test-only sinks and message builders used by unit and behaviour tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::{Action, CompiledBatch, Message, PIT_KIND, StatementSink};

/// Failure injected into a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RecordingSinkError(pub String);

/// In-memory [`StatementSink`] that records every batch it receives.
///
/// A failing sink records nothing and returns its configured error.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<CompiledBatch>>,
    failure: Option<String>,
}

impl RecordingSink {
    /// Sink that rejects every batch with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            batches: Mutex::default(),
            failure: Some(message.into()),
        }
    }

    /// Batches received so far.
    pub fn batches(&self) -> Vec<CompiledBatch> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StatementSink for RecordingSink {
    type Error = RecordingSinkError;

    async fn execute(&self, batch: &CompiledBatch) -> Result<(), Self::Error> {
        if let Some(message) = &self.failure {
            return Err(RecordingSinkError(message.clone()));
        }
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.clone());
        Ok(())
    }
}

/// A PIT `create` message with a name and an empty data object.
pub fn pit_create(dataset: &str, id: &str, name: &str) -> Message {
    Message::new(
        Action::Create,
        PIT_KIND,
        dataset,
        json!({"id": id, "type": "x", "name": name, "data": {}}),
    )
}

/// A PIT `update` message with a name and an empty data object.
pub fn pit_update(dataset: &str, id: &str, name: &str) -> Message {
    Message::new(
        Action::Update,
        PIT_KIND,
        dataset,
        json!({"id": id, "type": "x", "name": name, "data": {}}),
    )
}

/// A PIT `delete` message.
pub fn pit_delete(dataset: &str, id: &str) -> Message {
    Message::new(Action::Delete, PIT_KIND, dataset, json!({"id": id}))
}
