use super::*;
use crate::identity::{fingerprint, identify};
use tempfile::TempDir;

const DIM: usize = 4;

fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::new(temp_dir.path().join("lancedb"), "notes", DIM);
    (store, temp_dir)
}

fn create_test_record(path: &str, content: &str, vector: [f32; DIM]) -> VectorRecord {
    VectorRecord {
        id: identify(path).to_string(),
        vector: vector.to_vec(),
        path: path.to_string(),
        content_hash: fingerprint(content.as_bytes()).to_string(),
        last_updated: 1_700_000_000_000,
    }
}

#[tokio::test]
async fn bootstrap_creates_empty_table() {
    let (store, _temp_dir) = create_test_store();

    let count = store.count().await.expect("should count records");
    assert_eq!(count, 0, "schema placeholder must not survive bootstrap");

    let records = store.all_records().await.expect("should scan table");
    assert!(records.iter().all(|r| r.id != SCHEMA_SENTINEL_ID));
    assert!(store.is_available());
}

#[tokio::test]
async fn table_persists_across_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("lancedb");
    let record = create_test_record("a.md", "alpha", [1.0, 0.0, 0.0, 0.0]);

    {
        let store = VectorStore::new(&db_path, "notes", DIM);
        store.upsert(&record).await.expect("should upsert record");
    }

    let reopened = VectorStore::new(&db_path, "notes", DIM);
    let found = reopened
        .find(&record.id)
        .await
        .expect("should query reopened store");
    assert_eq!(found, Some(record));
}

#[tokio::test]
async fn reopen_with_other_dimension_is_unavailable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("lancedb");

    VectorStore::new(&db_path, "notes", DIM)
        .count()
        .await
        .expect("should create table");

    let wider = VectorStore::new(&db_path, "notes", DIM * 2);
    let err = wider.count().await.expect_err("dimension mismatch");
    assert!(err.is_unavailable());
    assert!(!wider.is_available());
}

#[tokio::test]
async fn find_returns_none_for_unknown_id() {
    let (store, _temp_dir) = create_test_store();

    let found = store
        .find(identify("missing.md").as_str())
        .await
        .expect("lookup should succeed");
    assert!(found.is_none());
}

#[tokio::test]
async fn upsert_replaces_existing_record() {
    let (store, _temp_dir) = create_test_store();

    let original = create_test_record("note.md", "v1", [1.0, 0.0, 0.0, 0.0]);
    store.upsert(&original).await.expect("should insert");

    let mut updated = create_test_record("note.md", "v2", [0.0, 1.0, 0.0, 0.0]);
    updated.last_updated = original.last_updated + 1;
    store.upsert(&updated).await.expect("should replace");

    assert_eq!(store.count().await.expect("should count"), 1);
    let found = store
        .find(&original.id)
        .await
        .expect("should query")
        .expect("record should exist");
    assert_eq!(found, updated);
}

#[tokio::test]
async fn upsert_rejects_wrong_dimension() {
    let (store, _temp_dir) = create_test_store();

    let mut record = create_test_record("note.md", "body", [1.0, 0.0, 0.0, 0.0]);
    record.vector.push(0.0);

    let result = store.upsert(&record).await;
    assert!(matches!(
        result,
        Err(VaultError::DimensionMismatch {
            expected: DIM,
            actual: 5
        })
    ));
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (store, _temp_dir) = create_test_store();
    let record = create_test_record("gone.md", "body", [0.0, 0.0, 1.0, 0.0]);

    store.upsert(&record).await.expect("should insert");
    store.delete_by_id(&record.id).await.expect("first delete");
    store
        .delete_by_id(&record.id)
        .await
        .expect("second delete is a no-op");

    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_any_store_call() {
    let (store, _temp_dir) = create_test_store();

    for bad in ["x' OR '1'='1", "\" OR 1=1 --", SCHEMA_SENTINEL_ID, ""] {
        assert!(matches!(
            store.find(bad).await,
            Err(VaultError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            store.delete_by_id(bad).await,
            Err(VaultError::MalformedIdentifier(_))
        ));
    }

    let mut record = create_test_record("a.md", "alpha", [1.0, 0.0, 0.0, 0.0]);
    record.id = "a' OR 'x'='x".to_string();
    assert!(matches!(
        store.upsert(&record).await,
        Err(VaultError::MalformedIdentifier(_))
    ));

    // Validation happens before the lazy open, so the store was never touched
    assert!(!store.table.is_initialized());
    assert!(!store.db_path().exists());
}

#[tokio::test]
async fn nearest_neighbors_orders_by_ascending_distance() {
    let (store, _temp_dir) = create_test_store();

    let near = create_test_record("near.md", "n", [1.0, 0.0, 0.0, 0.0]);
    let middle = create_test_record("middle.md", "m", [0.6, 0.8, 0.0, 0.0]);
    let far = create_test_record("far.md", "f", [0.0, 0.0, 0.0, 1.0]);
    for record in [&far, &near, &middle] {
        store.upsert(record).await.expect("should insert");
    }

    let neighbors = store
        .nearest_neighbors(&[1.0, 0.0, 0.0, 0.0], 10)
        .await
        .expect("search should succeed");

    let paths: Vec<&str> = neighbors.iter().map(|n| n.record.path.as_str()).collect();
    assert_eq!(paths, vec!["near.md", "middle.md", "far.md"]);
    assert!(neighbors[0].distance < 1e-6);
    assert!(neighbors.windows(2).all(|w| w[0].distance <= w[1].distance));

    let top = store
        .nearest_neighbors(&[1.0, 0.0, 0.0, 0.0], 2)
        .await
        .expect("search should succeed");
    assert_eq!(top.len(), 2);
    assert_eq!(top[1].record.path, "middle.md");
}

#[tokio::test]
async fn nearest_neighbors_checks_query_dimension() {
    let (store, _temp_dir) = create_test_store();

    let result = store.nearest_neighbors(&[1.0, 0.0], 5).await;
    assert!(matches!(result, Err(VaultError::DimensionMismatch { .. })));
}

#[tokio::test]
async fn all_records_returns_every_row() {
    let (store, _temp_dir) = create_test_store();

    for (i, path) in ["a.md", "b/b.md", "c/d/e.md"].iter().enumerate() {
        let mut vector = [0.0; DIM];
        vector[i] = 1.0;
        store
            .upsert(&create_test_record(path, path, vector))
            .await
            .expect("should insert");
    }

    let mut paths: Vec<String> = store
        .all_records()
        .await
        .expect("should scan")
        .into_iter()
        .map(|r| r.path)
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["a.md", "b/b.md", "c/d/e.md"]);
}

#[tokio::test]
async fn all_records_is_not_capped() {
    let (store, _temp_dir) = create_test_store();

    for i in 0..25 {
        let path = format!("note-{i}.md");
        let vector = [1.0, i as f32, 0.0, 0.0];
        store
            .upsert(&create_test_record(&path, &path, vector))
            .await
            .expect("should insert");
    }

    let records = store.all_records().await.expect("should scan");
    assert_eq!(records.len(), 25);
}

#[tokio::test]
async fn optimize_database() {
    let (store, _temp_dir) = create_test_store();

    let record = create_test_record("a.md", "alpha", [1.0, 0.0, 0.0, 0.0]);
    store.upsert(&record).await.expect("should insert");
    store.upsert(&record).await.expect("should replace");

    let result = store.optimize().await;
    assert!(
        result.is_ok(),
        "Failed to optimize database: {:?}",
        result.err()
    );
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn oversized_dimension_makes_store_unavailable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("lancedb");
    let store = VectorStore::new(&db_path, "notes", usize::MAX);

    let err = store.count().await.expect_err("dimension cannot be encoded");
    assert!(err.is_unavailable());
    assert!(!db_path.exists());
}
