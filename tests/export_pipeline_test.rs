//! Integration tests for the export pipeline against the in-memory store
//!
//! These tests verify that:
//! - Secondary data is loaded once per page, not once per record
//! - A record limit stops the run softly and the output is still deployed
//! - Checkpoints record the last exported id

mod common;

use courier::adapters::database::{Backends, CheckpointStorage};
use courier::adapters::memory::{MemoryData, MemoryStore};
use courier::core::export::{AbortMode, ExportPipeline};
use courier::core::state::ExportStatus;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn read_lines(dir: &TempDir) -> Vec<Value> {
    let path = dir.path().join("out").join("feed").join("feed.jsonl");
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_secondary_data_loaded_once_per_page() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new_shared(MemoryData {
        orders: common::orders(12),
        order_items: common::order_items(12),
        ..MemoryData::default()
    });
    let config = common::config(&dir, "order", 5, "");

    let summary = ExportPipeline::with_backends(
        config,
        Backends::from_memory(store.clone()),
        CancellationToken::new(),
    )
    .execute()
    .await
    .unwrap();

    assert!(summary.is_successful());
    assert_eq!(summary.run.succeeded, 12);
    assert_eq!(summary.run.pages_processed, 3);

    // 12 orders in pages of 5: one page query and one load per relation per page
    assert_eq!(store.calls("order_page").await, 3);
    assert_eq!(store.calls("order_items").await, 3);
    assert_eq!(store.calls("shipments").await, 3);
    assert_eq!(store.calls("customers_by_id").await, 3);

    let lines = read_lines(&dir);
    assert_eq!(lines.len(), 12);
    assert_eq!(lines[0]["order_number"], "SO-00001");
    assert_eq!(lines[0]["items"].as_array().unwrap().len(), 2);
    assert_eq!(lines[11]["id"], 12);
}

#[tokio::test]
async fn test_limit_stops_softly_and_still_deploys() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new_shared(MemoryData {
        categories: common::categories(20),
        ..MemoryData::default()
    });
    let target = dir.path().join("target");
    let mut config = common::config(
        &dir,
        "category",
        5,
        &format!(
            r#"
[[deployments]]
name = "disk"
kind = "filesystem"
path = "{}"
"#,
            target.display()
        ),
    );
    config.export.limit = Some(7);

    let summary = ExportPipeline::with_backends(
        config,
        Backends::from_memory(store.clone()),
        CancellationToken::new(),
    )
    .execute()
    .await
    .unwrap();

    assert_eq!(summary.run.succeeded, 7);
    assert_eq!(summary.run.abort_mode, AbortMode::Soft);
    assert!(!summary.run.incomplete);
    assert!(!summary.deployment_skipped);
    assert!(summary.deployments[0].succeeded());
    assert!(target.join("feed.jsonl").is_file());
    assert_eq!(read_lines(&dir).len(), 7);

    let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
    assert_eq!(checkpoint.last_id, 7);
}

#[tokio::test]
async fn test_projection_fields_restrict_documents() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new_shared(MemoryData {
        categories: common::categories(3),
        ..MemoryData::default()
    });
    let mut config = common::config(&dir, "category", 10, "");
    config.export.projection.fields = vec!["name".to_string()];

    ExportPipeline::with_backends(
        config,
        Backends::from_memory(store),
        CancellationToken::new(),
    )
    .execute()
    .await
    .unwrap();

    for line in read_lines(&dir) {
        let keys: Vec<&String> = line.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(line.get("id").is_some());
        assert!(line.get("name").is_some());
    }
}

#[tokio::test]
async fn test_entity_id_filter() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new_shared(MemoryData {
        categories: common::categories(10),
        ..MemoryData::default()
    });
    let mut config = common::config(&dir, "category", 2, "");
    config.export.filter.entity_ids = vec![2, 5, 9];

    let summary = ExportPipeline::with_backends(
        config,
        Backends::from_memory(store.clone()),
        CancellationToken::new(),
    )
    .execute()
    .await
    .unwrap();

    assert_eq!(summary.run.succeeded, 3);
    let ids: Vec<i64> = read_lines(&dir)
        .iter()
        .map(|line| line["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 5, 9]);

    let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, ExportStatus::Completed);
    assert_eq!(checkpoint.last_id, 9);
}

#[tokio::test]
async fn test_failed_page_query_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let store = std::sync::Arc::new(
        MemoryStore::from_data(MemoryData {
            categories: common::categories(3),
            ..MemoryData::default()
        })
        .fail_on("category_page"),
    );

    let result = ExportPipeline::with_backends(
        common::config(&dir, "category", 10, ""),
        Backends::from_memory(store.clone()),
        CancellationToken::new(),
    )
    .execute()
    .await;

    assert!(result.is_err());
    let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, ExportStatus::Failed);
}
