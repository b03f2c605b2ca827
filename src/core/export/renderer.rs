//! Record rendering
//!
//! The run loop hands every primary record to a [`RecordRenderer`]. The
//! renderer pulls whatever secondary data it needs from the context's batch
//! context. [`JsonLinesRenderer`] is the built-in renderer: one JSON document
//! per line, with the record's relations embedded.

use super::context::ExportContext;
use crate::core::batch::{ExportEntity, LazyMultimap};
use crate::domain::{
    Category, CourierError, Customer, EntityId, Manufacturer, Order, ReferenceKind, Result,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Consumer of the records of one run
#[async_trait]
pub trait RecordRenderer<P: ExportEntity>: Send {
    /// Called once before the first page
    async fn begin(&mut self, _ctx: &ExportContext<P>) -> Result<()> {
        Ok(())
    }

    /// Render one record. Errors are per-record unless they are structural.
    async fn render(&mut self, ctx: &ExportContext<P>, entity: &P) -> Result<()>;

    /// Flush the output and return the files written
    async fn finish(&mut self, ctx: &ExportContext<P>) -> Result<Vec<PathBuf>>;
}

/// JSON representation of a record together with its secondary data
#[async_trait]
pub trait JsonDocument: ExportEntity {
    async fn to_document(&self, ctx: &ExportContext<Self>) -> Result<Value>;
}

fn base_document<T: Serialize>(entity: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => Err(CourierError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// First value stored under an optional key
async fn first_of<V: Clone + Send + 'static>(
    map: &LazyMultimap<EntityId, V>,
    key: Option<EntityId>,
) -> Result<Option<V>> {
    match key {
        Some(key) => Ok(map.get(&key).await?.into_iter().next()),
        None => Ok(None),
    }
}

#[async_trait]
impl JsonDocument for Category {
    async fn to_document(&self, ctx: &ExportContext<Self>) -> Result<Value> {
        let batch = ctx.batch()?;
        let mut doc = base_document(self)?;

        let name = ctx.translation("Category", self.id, "Name").await?;
        doc.insert("localized_name".into(), json!(name.unwrap_or_else(|| self.name.clone())));
        doc.insert("slug".into(), json!(ctx.slug("Category", self.id).await?));
        doc.insert(
            "generic_attributes".into(),
            serde_json::to_value(batch.generic_attributes.get(&self.id).await?)?,
        );
        doc.insert(
            "product_categories".into(),
            serde_json::to_value(batch.product_categories.get(&self.id).await?)?,
        );
        doc.insert(
            "picture".into(),
            serde_json::to_value(first_of(&batch.media_files, self.media_file_id).await?)?,
        );

        Ok(Value::Object(doc))
    }
}

#[async_trait]
impl JsonDocument for Manufacturer {
    async fn to_document(&self, ctx: &ExportContext<Self>) -> Result<Value> {
        let batch = ctx.batch()?;
        let mut doc = base_document(self)?;

        let name = ctx.translation("Manufacturer", self.id, "Name").await?;
        doc.insert("localized_name".into(), json!(name.unwrap_or_else(|| self.name.clone())));
        doc.insert("slug".into(), json!(ctx.slug("Manufacturer", self.id).await?));
        doc.insert(
            "generic_attributes".into(),
            serde_json::to_value(batch.generic_attributes.get(&self.id).await?)?,
        );
        doc.insert(
            "product_manufacturers".into(),
            serde_json::to_value(batch.product_manufacturers.get(&self.id).await?)?,
        );
        doc.insert(
            "picture".into(),
            serde_json::to_value(first_of(&batch.media_files, self.media_file_id).await?)?,
        );

        Ok(Value::Object(doc))
    }
}

#[async_trait]
impl JsonDocument for Customer {
    async fn to_document(&self, ctx: &ExportContext<Self>) -> Result<Value> {
        let batch = ctx.batch()?;
        let mut doc = base_document(self)?;

        doc.insert(
            "generic_attributes".into(),
            serde_json::to_value(batch.generic_attributes.get(&self.id).await?)?,
        );
        doc.insert(
            "billing_address".into(),
            serde_json::to_value(first_of(&batch.addresses, self.billing_address_id).await?)?,
        );
        doc.insert(
            "shipping_address".into(),
            serde_json::to_value(first_of(&batch.addresses, self.shipping_address_id).await?)?,
        );

        let history = batch.reward_points_histories.get(&self.id).await?;
        let balance = history
            .iter()
            .max_by_key(|h| (h.created_on_utc, h.id))
            .map_or(0, |h| h.points_balance);
        doc.insert("reward_points_balance".into(), json!(balance));
        doc.insert("reward_points_history".into(), serde_json::to_value(history)?);

        Ok(Value::Object(doc))
    }
}

#[async_trait]
impl JsonDocument for Order {
    async fn to_document(&self, ctx: &ExportContext<Self>) -> Result<Value> {
        let batch = ctx.batch()?;
        let mut doc = base_document(self)?;

        doc.insert(
            "store_name".into(),
            json!(ctx.lookups().name(ReferenceKind::Store, self.store_id)),
        );
        let currency = ctx
            .lookups()
            .by_code(ReferenceKind::Currency, &self.currency_code)
            .map(|c| c.name.clone());
        doc.insert("currency_name".into(), json!(currency));

        doc.insert(
            "customer".into(),
            serde_json::to_value(first_of(&batch.customers, Some(self.customer_id)).await?)?,
        );
        doc.insert(
            "customer_attributes".into(),
            serde_json::to_value(batch.generic_attributes.get(&self.customer_id).await?)?,
        );
        doc.insert(
            "items".into(),
            serde_json::to_value(batch.order_items.get(&self.id).await?)?,
        );
        doc.insert(
            "shipments".into(),
            serde_json::to_value(batch.shipments.get(&self.id).await?)?,
        );
        doc.insert(
            "billing_address".into(),
            serde_json::to_value(first_of(&batch.addresses, self.billing_address_id).await?)?,
        );
        doc.insert(
            "shipping_address".into(),
            serde_json::to_value(first_of(&batch.addresses, self.shipping_address_id).await?)?,
        );
        doc.insert(
            "reward_points_history".into(),
            serde_json::to_value(batch.reward_points_histories.get(&self.customer_id).await?)?,
        );

        Ok(Value::Object(doc))
    }
}

/// Keep only the selected top-level fields; `id` always survives
pub fn project_fields(document: Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return document;
    }
    match document {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
                .collect(),
        ),
        other => other,
    }
}

/// Writes `<artifact_dir>/<profile>.jsonl`
#[derive(Default)]
pub struct JsonLinesRenderer {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    lines: usize,
}

impl JsonLinesRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents written so far
    pub fn lines(&self) -> usize {
        self.lines
    }
}

#[async_trait]
impl<P: JsonDocument> RecordRenderer<P> for JsonLinesRenderer {
    async fn begin(&mut self, ctx: &ExportContext<P>) -> Result<()> {
        let dir = ctx.config().artifact_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.jsonl", ctx.config().profile_name));
        // A resumed run continues the output of the interrupted one
        let resuming = ctx.result().last_id > 0;
        let file = if resuming {
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .await?
        } else {
            File::create(&path).await?
        };
        tracing::debug!(path = %path.display(), resuming, "Opened output file");

        self.writer = Some(BufWriter::new(file));
        self.path = Some(path);
        self.lines = 0;
        Ok(())
    }

    async fn render(&mut self, ctx: &ExportContext<P>, entity: &P) -> Result<()> {
        let document = entity.to_document(ctx).await?;
        let document = project_fields(document, &ctx.projection().fields);
        let mut line = serde_json::to_vec(&document)?;
        line.push(b'\n');

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CourierError::Export("renderer was not started".to_string()))?;
        writer.write_all(&line).await?;
        self.lines += 1;
        Ok(())
    }

    async fn finish(&mut self, _ctx: &ExportContext<P>) -> Result<Vec<PathBuf>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
        }
        Ok(self.path.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryData, MemoryStore};
    use crate::config::ExportConfig;
    use crate::core::export::context::ExportRunConfig;
    use crate::domain::{EntityKind, GenericAttribute, MediaFile, ProductCategory};
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn category(id: EntityId, media_file_id: Option<EntityId>) -> Category {
        Category {
            id,
            name: format!("Category {id}"),
            parent_id: None,
            media_file_id,
            published: true,
            updated_on_utc: Utc::now(),
        }
    }

    async fn context(dir: &TempDir, fields: Vec<String>) -> ExportContext<Category> {
        context_after(dir, fields, 0).await
    }

    async fn context_after(
        dir: &TempDir,
        fields: Vec<String>,
        resume_after: EntityId,
    ) -> ExportContext<Category> {
        let mut export = ExportConfig::new("feed", EntityKind::Category);
        export.output_dir = dir.path().to_string_lossy().to_string();
        export.projection.fields = fields;

        let store = MemoryStore::new_shared(MemoryData {
            product_categories: vec![ProductCategory {
                id: 1,
                product_id: 100,
                category_id: 1,
                display_order: 0,
            }],
            media_files: vec![MediaFile {
                id: 7,
                name: "books.png".to_string(),
                mime_type: "image/png".to_string(),
                size: 1024,
                folder_id: None,
            }],
            generic_attributes: vec![GenericAttribute {
                id: 1,
                entity_id: 1,
                key_group: "Category".to_string(),
                key: "Icon".to_string(),
                value: "book".to_string(),
                store_id: 0,
            }],
            ..MemoryData::default()
        });

        ExportContext::new(
            Arc::new(ExportRunConfig::from_config(&export, false)),
            store,
            CancellationToken::new(),
            resume_after,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_json_lines_embed_relations() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, Vec::new()).await;
        let page = vec![category(1, Some(7)), category(2, None)];

        let mut renderer = JsonLinesRenderer::new();
        renderer.begin(&ctx).await.unwrap();
        ctx.begin_page(&page);
        for entity in &page {
            renderer.render(&ctx, entity).await.unwrap();
        }
        let files = renderer.finish(&ctx).await.unwrap();

        assert_eq!(files, vec![dir.path().join("feed").join("feed.jsonl")]);
        let content = std::fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["product_categories"][0]["product_id"], 100);
        assert_eq!(lines[0]["picture"]["name"], "books.png");
        assert_eq!(lines[0]["localized_name"], "Category 1");
        assert!(lines[1]["picture"].is_null());
        assert_eq!(lines[1]["product_categories"], json!([]));
        assert_eq!(lines[0]["generic_attributes"][0]["key"], "Icon");
        assert_eq!(lines[1]["generic_attributes"], json!([]));
    }

    #[tokio::test]
    async fn test_resumed_run_appends_to_existing_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("feed");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("feed.jsonl"), "{\"id\":1}\n").unwrap();

        let mut ctx = context_after(&dir, Vec::new(), 1).await;
        let page = vec![category(2, None)];
        let mut renderer = JsonLinesRenderer::new();
        renderer.begin(&ctx).await.unwrap();
        ctx.begin_page(&page);
        renderer.render(&ctx, &page[0]).await.unwrap();
        renderer.finish(&ctx).await.unwrap();

        let content = std::fs::read_to_string(out.join("feed.jsonl")).unwrap();
        let ids: Vec<i64> = content
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fresh_run_truncates_previous_output() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("feed");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("feed.jsonl"), "{\"id\":99}\n").unwrap();

        let ctx = context(&dir, Vec::new()).await;
        let mut renderer = JsonLinesRenderer::new();
        renderer.begin(&ctx).await.unwrap();
        renderer.finish(&ctx).await.unwrap();

        assert_eq!(std::fs::read_to_string(out.join("feed.jsonl")).unwrap(), "");
    }

    #[tokio::test]
    async fn test_render_outside_page_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Vec::new()).await;

        let mut renderer = JsonLinesRenderer::new();
        renderer.begin(&ctx).await.unwrap();
        assert!(renderer.render(&ctx, &category(1, None)).await.is_err());
    }

    #[test]
    fn test_project_fields_keeps_id() {
        let doc = json!({"id": 1, "name": "Books", "published": true});
        let projected = project_fields(doc.clone(), &["name".to_string()]);
        assert_eq!(projected, json!({"id": 1, "name": "Books"}));
        assert_eq!(project_fields(doc.clone(), &[]), doc);
    }
}
