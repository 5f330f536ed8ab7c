//! Behavioural coverage for applying message batches through a sink.

use std::cell::RefCell;

use pitstore_core::test_support::{RecordingSink, RecordingSinkError, pit_create};
use pitstore_core::{
    Action, BatchExecutor, BatchOutcome, BulkApplyError, Message, MessageError, PIT_KIND,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;

type ApplyResult = Result<BatchOutcome, BulkApplyError<RecordingSinkError>>;

#[derive(Debug, Default)]
struct BulkApplyWorld {
    sink_failure: RefCell<Option<String>>,
    messages: RefCell<Vec<Message>>,
    executor: RefCell<Option<BatchExecutor<RecordingSink>>>,
    result: RefCell<Option<ApplyResult>>,
}

impl BulkApplyWorld {
    fn with_result<T>(&self, check: impl FnOnce(&ApplyResult) -> T) -> T {
        let borrowed = self.result.borrow();
        let result = borrowed
            .as_ref()
            .unwrap_or_else(|| panic!("batch should have been applied"));
        check(result)
    }

    fn with_sink<T>(&self, check: impl FnOnce(&RecordingSink) -> T) -> T {
        let borrowed = self.executor.borrow();
        let executor = borrowed
            .as_ref()
            .unwrap_or_else(|| panic!("executor should exist"));
        check(executor.sink())
    }
}

#[fixture]
fn world() -> BulkApplyWorld {
    BulkApplyWorld::default()
}

fn relation(dataset: &str) -> Message {
    Message::new(
        Action::Create,
        "relation",
        dataset,
        json!({"from": "a1", "to": "a2", "type": "hg:sameHgConcept"}),
    )
}

#[given("a sink that rejects every batch")]
fn failing_sink(world: &BulkApplyWorld) {
    world
        .sink_failure
        .replace(Some("connection reset".to_owned()));
}

#[given("a batch with two PIT creates and one relation message")]
fn mixed_batch(world: &BulkApplyWorld) {
    world.messages.replace(vec![
        pit_create("d1", "a1", "Amsterdam"),
        relation("d1"),
        pit_create("d1", "a2", "Utrecht"),
    ]);
}

#[given("a batch with only relation messages")]
fn relation_batch(world: &BulkApplyWorld) {
    world
        .messages
        .replace(vec![relation("d1"), relation("d2")]);
}

#[given("a batch whose second PIT message has no type")]
fn malformed_batch(world: &BulkApplyWorld) {
    world.messages.replace(vec![
        pit_create("d1", "a1", "Amsterdam"),
        Message::new(Action::Update, PIT_KIND, "d1", json!({"id": "a2"})),
    ]);
}

#[when("the batch is applied")]
fn apply_batch(world: &BulkApplyWorld) {
    let sink = world
        .sink_failure
        .borrow()
        .as_ref()
        .map_or_else(RecordingSink::default, RecordingSink::failing);
    let executor = BatchExecutor::new(sink);
    let messages = world.messages.borrow().clone();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap_or_else(|err| panic!("build test runtime: {err}"));
    let result = runtime.block_on(executor.bulk_apply(&messages));
    world.executor.replace(Some(executor));
    world.result.replace(Some(result));
}

#[then("the sink receives a single batch of two statements")]
fn single_batch(world: &BulkApplyWorld) {
    world.with_sink(|sink| {
        let batches = sink.batches();
        let [batch] = batches.as_slice() else {
            panic!("expected one batch, got {}", batches.len());
        };
        assert_eq!(batch.len(), 2);
        assert!(
            batch
                .statements()
                .iter()
                .all(|statement| statement.sql().starts_with("INSERT INTO pits "))
        );
    });
}

#[then("the outcome counts three received messages")]
fn three_received(world: &BulkApplyWorld) {
    world.with_result(|result| match result {
        Ok(outcome) => assert_eq!(
            *outcome,
            BatchOutcome {
                received: 3,
                applied: 2
            }
        ),
        Err(err) => panic!("batch should apply, got {err}"),
    });
}

#[then("the sink receives nothing")]
fn sink_untouched(world: &BulkApplyWorld) {
    world.with_sink(|sink| assert!(sink.batches().is_empty()));
}

#[then("the outcome counts no applied statements")]
fn none_applied(world: &BulkApplyWorld) {
    world.with_result(|result| match result {
        Ok(outcome) => assert_eq!(outcome.applied, 0),
        Err(err) => panic!("batch should apply, got {err}"),
    });
}

#[then("applying fails with an invalid payload error")]
fn invalid_payload(world: &BulkApplyWorld) {
    world.with_result(|result| match result {
        Err(BulkApplyError::Message(MessageError::InvalidPayload { action, .. })) => {
            assert_eq!(*action, Action::Update);
        }
        other => panic!("expected an invalid payload error, got {other:?}"),
    });
}

#[then("applying fails with a sink error")]
fn sink_error(world: &BulkApplyWorld) {
    world.with_result(|result| match result {
        Err(BulkApplyError::Sink(source)) => assert_eq!(source.0, "connection reset"),
        other => panic!("expected a sink error, got {other:?}"),
    });
}

#[scenario(path = "tests/features/bulk_apply.feature", index = 0)]
fn mixed_batch_is_applied(world: BulkApplyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/bulk_apply.feature", index = 1)]
fn relation_only_batch_skips_sink(world: BulkApplyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/bulk_apply.feature", index = 2)]
fn malformed_payload_aborts(world: BulkApplyWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/bulk_apply.feature", index = 3)]
fn sink_failure_is_surfaced(world: BulkApplyWorld) {
    let _ = world;
}
