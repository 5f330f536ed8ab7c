//! Integration coverage against a live PostGIS server.
//!
//! These tests run only when `PITSTORE_TEST_DATABASE_URL` names a database
//! with the PostGIS extension installed; otherwise each test returns early.
//! Every test works on its own table and drops it afterwards.

use std::time::Duration;

use futures_util::StreamExt;
use pitstore_core::test_support::{pit_create, pit_delete, pit_update};
use pitstore_core::{
    Action, BatchOutcome, Message, PIT_KIND, QueryCompiler, StatementStyle, TableName,
};
use pitstore_postgis::{ConnectionDescriptor, PitStore, Pool, StreamOptions};
use rstest::rstest;
use serde_json::json;

const TEST_DATABASE_URL_ENV: &str = "PITSTORE_TEST_DATABASE_URL";

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build test runtime")
        .block_on(future)
}

fn test_pool(max_size: usize) -> Option<Pool> {
    let url = std::env::var(TEST_DATABASE_URL_ENV).ok()?;
    let descriptor = ConnectionDescriptor::from_url(&url).expect("valid test database URL");
    Some(descriptor.create_pool(max_size).expect("build pool"))
}

async fn fresh_store(pool: Pool, table: &str) -> PitStore {
    fresh_store_with(pool, table, StatementStyle::Bound).await
}

async fn fresh_store_with(pool: Pool, table: &str, style: StatementStyle) -> PitStore {
    let table = TableName::new(table).expect("valid table name");
    let store = PitStore::with_compiler(pool, QueryCompiler::new(table, style));
    drop_table(&store).await;
    assert!(store.bootstrap().await.expect("bootstrap"), "table should be created");
    store
}

async fn drop_table(store: &PitStore) {
    let client = store.pool().get().await.expect("connection");
    client
        .batch_execute(&format!("DROP TABLE IF EXISTS {}", store.table()))
        .await
        .expect("drop table");
}

fn pit(action: Action, dataset: &str, payload: serde_json::Value) -> Message {
    Message::new(action, PIT_KIND, dataset, payload)
}

#[rstest]
fn bootstrap_is_idempotent() {
    let Some(pool) = test_pool(2) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_bootstrap").await;
        assert!(!store.bootstrap().await.expect("second bootstrap"));
        drop_table(&store).await;
    });
}

#[rstest]
fn create_then_update_leaves_one_row() {
    let Some(pool) = test_pool(2) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_upsert").await;
        let messages = [
            pit(
                Action::Create,
                "d1",
                json!({"id": "a1", "name": "Old Name", "type": "hg:Place"}),
            ),
            pit(
                Action::Update,
                "d1",
                json!({
                    "geometry": {"coordinates": [4.9, 52.37], "type": "Point"},
                    "id": "a1",
                    "name": "New Name",
                    "type": "hg:Place",
                    "validSince": ["1900-01-01", "1900-12-31"],
                }),
            ),
        ];
        let outcome = store.bulk_apply(&messages).await.expect("apply batch");
        assert_eq!(
            outcome,
            BatchOutcome {
                received: 2,
                applied: 2
            }
        );

        let rows = store
            .execute_read(
                &format!(
                    "SELECT name, ST_SRID(geometry) AS srid FROM {} WHERE id = $1 AND dataset = $2",
                    store.table()
                ),
                &[&"a1", &"d1"],
            )
            .await
            .expect("read back");
        let [row] = rows.as_slice() else {
            panic!("expected exactly one row, got {}", rows.len());
        };
        assert_eq!(row.try_get::<_, String>("name").expect("name"), "New Name");
        assert_eq!(row.try_get::<_, i32>("srid").expect("srid"), 4326);
        drop_table(&store).await;
    });
}

#[rstest]
fn deleting_a_missing_key_is_a_no_op() {
    let Some(pool) = test_pool(2) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_delete").await;
        let outcome = store
            .bulk_apply(&[pit(Action::Delete, "d1", json!({"id": "never-inserted"}))])
            .await
            .expect("delete succeeds");
        assert_eq!(outcome.applied, 1);
        drop_table(&store).await;
    });
}

#[rstest]
fn failing_statement_rolls_back_the_batch() {
    let Some(pool) = test_pool(2) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_rollback").await;
        let messages = [
            pit(Action::Create, "d1", json!({"id": "a1", "type": "hg:Place"})),
            pit(
                Action::Create,
                "d1",
                json!({"geometry": {"type": "NotAGeometry"}, "id": "a2", "type": "hg:Place"}),
            ),
        ];
        let err = store
            .bulk_apply(&messages)
            .await
            .expect_err("invalid geometry aborts the batch");
        assert!(
            err.to_string().contains("ERROR: "),
            "server message should be reported: {err}"
        );
        let rows = store
            .execute_read(&format!("SELECT id FROM {}", store.table()), &[])
            .await
            .expect("read back");
        assert!(rows.is_empty(), "first statement should be rolled back");
        drop_table(&store).await;
    });
}

#[rstest]
fn stream_yields_every_row_and_releases_the_connection() {
    let Some(pool) = test_pool(1) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_stream")
            .await
            .with_stream_options(StreamOptions::default().with_page_size(100));
        let messages: Vec<_> = (0..250)
            .map(|index| {
                pit(
                    Action::Create,
                    "d1",
                    json!({"id": format!("a{index:03}"), "type": "hg:Place"}),
                )
            })
            .collect();
        store.bulk_apply(&messages).await.expect("seed rows");

        let mut stream = store
            .open_stream(&format!("SELECT id FROM {} ORDER BY id;", store.table()))
            .await
            .expect("open stream");
        let mut count = 0_usize;
        while let Some(row) = stream.next().await {
            row.expect("row");
            count += 1;
        }
        assert_eq!(count, 250);
        assert_eq!(store.pool().status().available, 1);
        drop_table(&store).await;
    });
}

#[rstest]
fn cancel_returns_the_connection() {
    let Some(pool) = test_pool(1) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_cancel").await;
        let messages: Vec<_> = (0..5)
            .map(|index| pit(Action::Create, "d1", json!({"id": format!("a{index}"), "type": "x"})))
            .collect();
        store.bulk_apply(&messages).await.expect("seed rows");

        let mut stream = store
            .open_stream(&format!("SELECT id FROM {}", store.table()))
            .await
            .expect("open stream");
        stream.next().await.expect("first row").expect("row");
        stream.cancel().await.expect("cancel");
        assert_eq!(store.pool().status().available, 1);
        drop_table(&store).await;
    });
}

#[rstest]
fn dropping_a_stream_discards_the_connection() {
    let Some(pool) = test_pool(1) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_abandon").await;
        store
            .bulk_apply(&[pit(Action::Create, "d1", json!({"id": "a1", "type": "x"}))])
            .await
            .expect("seed row");

        let mut stream = store
            .open_stream(&format!("SELECT id FROM {}", store.table()))
            .await
            .expect("open stream");
        stream.next().await.expect("first row").expect("row");
        drop(stream);
        assert_eq!(store.pool().status().size, 0);
        drop_table(&store).await;
    });
}

#[rstest]
fn truncate_empties_the_table() {
    let Some(pool) = test_pool(2) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_truncate").await;
        store
            .bulk_apply(&[pit(Action::Create, "d1", json!({"id": "a1", "type": "x"}))])
            .await
            .expect("seed row");
        store.truncate().await.expect("truncate");
        let rows = store
            .execute_read(&format!("SELECT id FROM {}", store.table()), &[])
            .await
            .expect("read back");
        assert!(rows.is_empty());
        drop_table(&store).await;
    });
}

async fn names_of(store: &PitStore) -> Vec<String> {
    store
        .execute_read(
            &format!("SELECT name FROM {} ORDER BY id", store.table()),
            &[],
        )
        .await
        .expect("read back")
        .iter()
        .map(|row| row.try_get::<_, String>("name").expect("name"))
        .collect()
}

#[rstest]
#[case(StatementStyle::Inline, "pits_it_quotes_inline")]
#[case(StatementStyle::Bound, "pits_it_quotes_bound")]
fn quoted_names_round_trip(#[case] style: StatementStyle, #[case] table: &str) {
    let Some(pool) = test_pool(2) else { return };
    block_on(async {
        let store = fresh_store_with(pool, table, style).await;
        let messages = [
            pit_create("d1", "a1", "O'Brien"),
            pit_create("d1", "a2", r"C:\archive\'t Hoff"),
        ];
        store.bulk_apply(&messages).await.expect("apply batch");
        assert_eq!(
            names_of(&store).await,
            ["O'Brien".to_owned(), r"C:\archive\'t Hoff".to_owned()]
        );
        drop_table(&store).await;
    });
}

#[rstest]
fn create_update_delete_leaves_no_rows() {
    let Some(pool) = test_pool(2) else { return };
    block_on(async {
        let store = fresh_store_with(pool, "pits_it_lifecycle", StatementStyle::Inline).await;
        store
            .bulk_apply(&[pit_create("d1", "a1", "Old Name")])
            .await
            .expect("create");
        store
            .bulk_apply(&[pit_update("d1", "a1", "New Name")])
            .await
            .expect("update");
        assert_eq!(names_of(&store).await, ["New Name".to_owned()]);

        let outcome = store
            .bulk_apply(&[pit_delete("d1", "a1")])
            .await
            .expect("delete");
        assert_eq!(outcome.applied, 1);
        assert!(names_of(&store).await.is_empty());
        drop_table(&store).await;
    });
}

#[rstest]
fn abandoned_bulk_apply_does_not_leak_its_transaction() {
    let Some(pool) = test_pool(1) else { return };
    block_on(async {
        let store = fresh_store(pool, "pits_it_abandon_tx").await;
        store
            .bulk_apply(&[pit_create("d1", "a1", "slow")])
            .await
            .expect("seed row");
        let client = store.pool().get().await.expect("connection");
        client
            .batch_execute(&format!(
                "CREATE OR REPLACE FUNCTION pits_it_slow_delete() RETURNS trigger AS $$ \
                 BEGIN PERFORM pg_sleep(2); RETURN OLD; END $$ LANGUAGE plpgsql; \
                 CREATE TRIGGER pits_it_slow_delete BEFORE DELETE ON {} \
                 FOR EACH ROW EXECUTE FUNCTION pits_it_slow_delete()",
                store.table()
            ))
            .await
            .expect("install slow trigger");
        drop(client);

        let attempt = tokio::time::timeout(
            Duration::from_millis(500),
            store.bulk_apply(&[pit_delete("d1", "a1")]),
        )
        .await;
        assert!(attempt.is_err(), "delete should still be sleeping");

        let rows = store
            .execute_read("SELECT (now() <> statement_timestamp())::text AS stale", &[])
            .await
            .expect("next borrower reads");
        let [row] = rows.as_slice() else {
            panic!("expected one row, got {}", rows.len());
        };
        assert_eq!(row.try_get::<_, String>("stale").expect("stale"), "false");

        drop_table(&store).await;
        let client = store.pool().get().await.expect("connection");
        client
            .batch_execute("DROP FUNCTION IF EXISTS pits_it_slow_delete()")
            .await
            .expect("drop trigger function");
    });
}
