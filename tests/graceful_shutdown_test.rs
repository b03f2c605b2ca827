//! Integration tests for cancellation and aborts
//!
//! These tests verify that:
//! - Cancellation finishes the current record and keeps the output
//! - A hard abort flags the output incomplete and names the record
//! - Per-record errors are counted without stopping the run
//! - An interrupted run resumes after the last exported id

mod common;

use async_trait::async_trait;
use courier::adapters::database::{Backends, CheckpointStorage, ExportStore};
use courier::adapters::memory::{MemoryData, MemoryStore};
use courier::config::ExportConfig;
use courier::core::export::{
    run_export, AbortMode, ExportContext, ExportPipeline, ExportRunConfig, RecordRenderer,
};
use courier::core::state::ExportStatus;
use courier::domain::{Category, CourierError, EntityId, EntityKind, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Records rendered ids; cancels or fails on chosen ids
#[derive(Default)]
struct ScriptedRenderer {
    rendered: Vec<EntityId>,
    cancel_after: Option<(EntityId, CancellationToken)>,
    fail_on: Option<EntityId>,
    out_of_memory_on: Option<EntityId>,
}

#[async_trait]
impl RecordRenderer<Category> for ScriptedRenderer {
    async fn render(&mut self, _ctx: &ExportContext<Category>, entity: &Category) -> Result<()> {
        if self.out_of_memory_on == Some(entity.id) {
            return Err(CourierError::OutOfMemory("document too large".to_string()));
        }
        if self.fail_on == Some(entity.id) {
            return Err(CourierError::Record("missing name".to_string()));
        }
        self.rendered.push(entity.id);
        if let Some((id, token)) = &self.cancel_after {
            if *id == entity.id {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn finish(&mut self, _ctx: &ExportContext<Category>) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

async fn context(
    store: Arc<MemoryStore>,
    page_size: usize,
    cancel: CancellationToken,
) -> ExportContext<Category> {
    let mut export = ExportConfig::new("feed", EntityKind::Category);
    export.page_size = page_size;
    let config = Arc::new(ExportRunConfig::from_config(&export, false));
    let store: Arc<dyn ExportStore> = store;
    ExportContext::new(config, store, cancel, 0).await.unwrap()
}

fn store(count: EntityId) -> Arc<MemoryStore> {
    MemoryStore::new_shared(MemoryData {
        categories: common::categories(count),
        ..MemoryData::default()
    })
}

#[tokio::test]
async fn test_cancellation_finishes_current_record() {
    let cancel = CancellationToken::new();
    let ctx = context(store(10), 4, cancel.clone()).await;
    let mut renderer = ScriptedRenderer {
        cancel_after: Some((6, cancel.clone())),
        ..ScriptedRenderer::default()
    };

    let result = run_export(ctx, &mut renderer, None).await.unwrap();

    assert_eq!(renderer.rendered, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(result.abort_mode, AbortMode::Soft);
    assert_eq!(result.succeeded, 6);
    assert_eq!(result.last_id, 6);
    assert!(!result.incomplete);
}

#[tokio::test]
async fn test_out_of_memory_hard_aborts() {
    let ctx = context(store(10), 4, CancellationToken::new()).await;
    let mut renderer = ScriptedRenderer {
        out_of_memory_on: Some(3),
        ..ScriptedRenderer::default()
    };

    let result = run_export(ctx, &mut renderer, None).await.unwrap();

    assert_eq!(renderer.rendered, vec![1, 2]);
    assert_eq!(result.abort_mode, AbortMode::Hard);
    assert!(result.incomplete);
    let cause = result.abort_cause.unwrap();
    assert_eq!(cause.entity_id, 3);
    assert!(cause.message.contains("document too large"));
}

#[tokio::test]
async fn test_record_error_is_counted_and_run_continues() {
    let ctx = context(store(5), 2, CancellationToken::new()).await;
    let mut renderer = ScriptedRenderer {
        fail_on: Some(2),
        ..ScriptedRenderer::default()
    };

    let result = run_export(ctx, &mut renderer, None).await.unwrap();

    assert_eq!(renderer.rendered, vec![1, 3, 4, 5]);
    assert_eq!(result.succeeded, 4);
    assert_eq!(result.failed, 1);
    assert!(result.errors[&2].contains("missing name"));
    assert_eq!(result.abort_mode, AbortMode::None);
    assert_eq!(result.last_id, 5);
}

#[tokio::test]
async fn test_resumed_run_completes_interrupted_output() {
    let dir = TempDir::new().unwrap();
    let store = store(12);

    // First run stops after 8 records and is left interrupted
    let mut first = common::config(&dir, "category", 3, "");
    first.export.limit = Some(8);
    let summary = ExportPipeline::with_backends(
        first,
        Backends::from_memory(store.clone()),
        CancellationToken::new(),
    )
    .execute()
    .await
    .unwrap();
    assert_eq!(summary.run.succeeded, 8);

    let mut interrupted = store.load_checkpoint("feed").await.unwrap().unwrap();
    assert_eq!(interrupted.last_id, 8);
    interrupted.status = ExportStatus::Interrupted;
    store.save_checkpoint(&interrupted, false).await.unwrap();

    let mut second = common::config(&dir, "category", 3, "");
    second.export.resume = true;
    let summary = ExportPipeline::with_backends(
        second,
        Backends::from_memory(store.clone()),
        CancellationToken::new(),
    )
    .execute()
    .await
    .unwrap();
    assert_eq!(summary.run.succeeded, 4);

    let jsonl =
        std::fs::read_to_string(dir.path().join("out").join("feed").join("feed.jsonl")).unwrap();
    let ids: Vec<i64> = jsonl
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, (1..=12).collect::<Vec<i64>>());

    let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, ExportStatus::Completed);
    assert_eq!(checkpoint.last_id, 12);
}

#[tokio::test]
async fn test_cancelled_pipeline_keeps_output_and_skips_deployment() {
    let dir = TempDir::new().unwrap();
    let store = store(3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let target = dir.path().join("target");
    let config = common::config(
        &dir,
        "category",
        10,
        &format!(
            "[[deployments]]\nname = \"disk\"\nkind = \"filesystem\"\npath = \"{}\"\n",
            target.display()
        ),
    );

    let summary = ExportPipeline::with_backends(config, Backends::from_memory(store.clone()), cancel)
        .execute()
        .await
        .unwrap();

    assert!(summary.was_interrupted());
    assert!(summary.deployment_skipped);
    assert!(!target.exists());
    let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
    assert_eq!(checkpoint.status, ExportStatus::Interrupted);
}
