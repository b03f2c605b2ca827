//! In-memory store for tests and dry runs
//!
//! Implements every data-access trait over plain vectors. Each trait method
//! counts its invocations so tests can assert how many round trips a run
//! issued, and any method can be told to fail.

use crate::adapters::database::traits::{CheckpointStorage, EmailQueue, ExportStore};
use crate::config::ExportFilter;
use crate::core::paging::PageRequest;
use crate::core::state::Checkpoint;
use crate::domain::{
    Address, Category, CourierError, Customer, EntityId, GenericAttribute, LocalizedProperty,
    Manufacturer, MediaFile, Order, OrderItem, ProductCategory, ProductManufacturer, QueuedEmail,
    ReferenceKind, ReferenceRecord, Result, RewardPointsHistory, Shipment, UrlRecord,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Rows served by a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryData {
    pub categories: Vec<Category>,
    pub manufacturers: Vec<Manufacturer>,
    pub customers: Vec<Customer>,
    pub orders: Vec<Order>,
    pub product_categories: Vec<ProductCategory>,
    pub product_manufacturers: Vec<ProductManufacturer>,
    pub media_files: Vec<MediaFile>,
    pub generic_attributes: Vec<GenericAttribute>,
    pub addresses: Vec<Address>,
    pub order_items: Vec<OrderItem>,
    pub shipments: Vec<Shipment>,
    pub reward_points_histories: Vec<RewardPointsHistory>,
    pub localized_properties: Vec<LocalizedProperty>,
    pub url_records: Vec<UrlRecord>,
    pub reference_data: HashMap<ReferenceKind, Vec<ReferenceRecord>>,
}

/// In-memory implementation of [`ExportStore`], [`EmailQueue`] and
/// [`CheckpointStorage`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    emails: Mutex<Vec<QueuedEmail>>,
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: MemoryData) -> Self {
        Self {
            data: RwLock::new(data),
            ..Self::default()
        }
    }

    pub fn new_shared(data: MemoryData) -> Arc<Self> {
        Arc::new(Self::from_data(data))
    }

    /// Make `method` return a database error from now on
    pub fn fail_on(mut self, method: &'static str) -> Self {
        self.failing.get_mut().insert(method);
        self
    }

    /// Number of times `method` was invoked
    pub async fn calls(&self, method: &str) -> usize {
        self.calls.lock().await.get(method).copied().unwrap_or(0)
    }

    /// Total invocations across all methods
    pub async fn total_calls(&self) -> usize {
        self.calls.lock().await.values().sum()
    }

    pub async fn queued_emails(&self) -> Vec<QueuedEmail> {
        self.emails.lock().await.clone()
    }

    pub async fn replace_data(&self, data: MemoryData) {
        *self.data.write().await = data;
    }

    async fn record(&self, method: &'static str) -> Result<()> {
        *self.calls.lock().await.entry(method).or_insert(0) += 1;
        if self.failing.lock().await.contains(method) {
            return Err(CourierError::Database(format!(
                "simulated failure in {method}"
            )));
        }
        Ok(())
    }
}

fn page<T, F, P>(rows: &[T], request: &PageRequest, id_of: F, keep: P) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> EntityId,
    P: Fn(&T) -> bool,
{
    let mut matching: Vec<&T> = rows.iter().filter(|row| keep(*row)).collect();
    matching.sort_by_key(|row| id_of(*row));
    request
        .slice(&matching, |row| id_of(*row))
        .iter()
        .map(|row| (*row).clone())
        .collect()
}

fn by_keys<T, F>(rows: &[T], keys: &[EntityId], key_of: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> EntityId,
{
    let keys: HashSet<EntityId> = keys.iter().copied().collect();
    rows.iter()
        .filter(|row| keys.contains(&key_of(*row)))
        .cloned()
        .collect()
}

fn in_scope(entity_ids: Option<&[EntityId]>, id: EntityId) -> bool {
    entity_ids.map_or(true, |ids| ids.contains(&id))
}

#[async_trait]
impl ExportStore for MemoryStore {
    async fn test_connection(&self) -> Result<()> {
        self.record("test_connection").await
    }

    async fn category_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Category>> {
        self.record("category_page").await?;
        let data = self.data.read().await;
        Ok(page(&data.categories, request, |c| c.id, |c| {
            filter.accepts(c.id, c.updated_on_utc, c.published)
        }))
    }

    async fn manufacturer_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Manufacturer>> {
        self.record("manufacturer_page").await?;
        let data = self.data.read().await;
        Ok(page(&data.manufacturers, request, |m| m.id, |m| {
            filter.accepts(m.id, m.updated_on_utc, m.published)
        }))
    }

    async fn customer_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Customer>> {
        self.record("customer_page").await?;
        let data = self.data.read().await;
        Ok(page(&data.customers, request, |c| c.id, |c| {
            filter.accepts(c.id, c.created_on_utc, c.active)
        }))
    }

    async fn order_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Order>> {
        self.record("order_page").await?;
        let data = self.data.read().await;
        Ok(page(&data.orders, request, |o| o.id, |o| {
            filter.accepts(o.id, o.created_on_utc, true)
                && filter.store_id.map_or(true, |store| o.store_id == store)
        }))
    }

    async fn product_categories(&self, category_ids: &[EntityId]) -> Result<Vec<ProductCategory>> {
        self.record("product_categories").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.product_categories, category_ids, |pc| {
            pc.category_id
        }))
    }

    async fn product_manufacturers(
        &self,
        manufacturer_ids: &[EntityId],
    ) -> Result<Vec<ProductManufacturer>> {
        self.record("product_manufacturers").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.product_manufacturers, manufacturer_ids, |pm| {
            pm.manufacturer_id
        }))
    }

    async fn media_files(&self, ids: &[EntityId]) -> Result<Vec<MediaFile>> {
        self.record("media_files").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.media_files, ids, |m| m.id))
    }

    async fn generic_attributes(
        &self,
        key_group: &str,
        entity_ids: &[EntityId],
    ) -> Result<Vec<GenericAttribute>> {
        self.record("generic_attributes").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.generic_attributes, entity_ids, |a| a.entity_id)
            .into_iter()
            .filter(|a| a.key_group == key_group)
            .collect())
    }

    async fn addresses(&self, ids: &[EntityId]) -> Result<Vec<Address>> {
        self.record("addresses").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.addresses, ids, |a| a.id))
    }

    async fn customers_by_id(&self, ids: &[EntityId]) -> Result<Vec<Customer>> {
        self.record("customers_by_id").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.customers, ids, |c| c.id))
    }

    async fn order_items(&self, order_ids: &[EntityId]) -> Result<Vec<OrderItem>> {
        self.record("order_items").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.order_items, order_ids, |i| i.order_id))
    }

    async fn shipments(&self, order_ids: &[EntityId]) -> Result<Vec<Shipment>> {
        self.record("shipments").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.shipments, order_ids, |s| s.order_id))
    }

    async fn reward_points_histories(
        &self,
        customer_ids: &[EntityId],
    ) -> Result<Vec<RewardPointsHistory>> {
        self.record("reward_points_histories").await?;
        let data = self.data.read().await;
        Ok(by_keys(&data.reward_points_histories, customer_ids, |r| {
            r.customer_id
        }))
    }

    async fn localized_properties(
        &self,
        key_group: &str,
        language_id: EntityId,
        entity_ids: Option<&[EntityId]>,
    ) -> Result<Vec<LocalizedProperty>> {
        self.record("localized_properties").await?;
        let data = self.data.read().await;
        Ok(data
            .localized_properties
            .iter()
            .filter(|p| {
                p.locale_key_group == key_group
                    && p.language_id == language_id
                    && in_scope(entity_ids, p.entity_id)
            })
            .cloned()
            .collect())
    }

    async fn url_records(
        &self,
        entity_name: &str,
        language_id: EntityId,
        entity_ids: Option<&[EntityId]>,
    ) -> Result<Vec<UrlRecord>> {
        self.record("url_records").await?;
        let data = self.data.read().await;
        Ok(data
            .url_records
            .iter()
            .filter(|u| {
                u.is_active
                    && u.entity_name == entity_name
                    && u.language_id == language_id
                    && in_scope(entity_ids, u.entity_id)
            })
            .cloned()
            .collect())
    }

    async fn reference_data(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRecord>> {
        self.record("reference_data").await?;
        let data = self.data.read().await;
        Ok(data.reference_data.get(&kind).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl EmailQueue for MemoryStore {
    async fn enqueue(&self, email: &QueuedEmail) -> Result<EntityId> {
        self.record("enqueue").await?;
        let mut emails = self.emails.lock().await;
        emails.push(email.clone());
        Ok(emails.len() as EntityId)
    }
}

#[async_trait]
impl CheckpointStorage for MemoryStore {
    async fn load_checkpoint(&self, profile_name: &str) -> Result<Option<Checkpoint>> {
        self.record("load_checkpoint").await?;
        Ok(self.checkpoints.lock().await.get(profile_name).cloned())
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint, dry_run: bool) -> Result<()> {
        self.record("save_checkpoint").await?;
        if dry_run {
            tracing::info!(
                profile = %checkpoint.profile_name,
                "DRY RUN: Would save checkpoint"
            );
            return Ok(());
        }
        self.checkpoints
            .lock()
            .await
            .insert(checkpoint.profile_name.clone(), checkpoint.clone());
        Ok(())
    }

    async fn all_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        self.record("all_checkpoints").await?;
        let mut all: Vec<Checkpoint> = self.checkpoints.lock().await.values().cloned().collect();
        all.sort_by(|a, b| a.profile_name.cmp(&b.profile_name));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityKind;
    use chrono::Utc;

    fn category(id: EntityId, published: bool) -> Category {
        Category {
            id,
            name: format!("Category {id}"),
            parent_id: None,
            media_file_id: None,
            published,
            updated_on_utc: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_category_page_sorts_and_filters() {
        let store = MemoryStore::from_data(MemoryData {
            categories: vec![category(3, true), category(1, true), category(2, false)],
            ..MemoryData::default()
        });

        let request = PageRequest::After { last_id: 0, limit: 10 };
        let rows = store
            .category_page(&request, &ExportFilter::default())
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(store.calls("category_page").await, 1);
    }

    #[tokio::test]
    async fn test_secondary_lookup_is_scoped_to_keys() {
        let store = MemoryStore::from_data(MemoryData {
            product_categories: vec![
                ProductCategory { id: 1, product_id: 10, category_id: 1, display_order: 0 },
                ProductCategory { id: 2, product_id: 11, category_id: 2, display_order: 0 },
                ProductCategory { id: 3, product_id: 12, category_id: 9, display_order: 0 },
            ],
            ..MemoryData::default()
        });

        let rows = store.product_categories(&[1, 2]).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|pc| pc.category_id != 9));
    }

    #[tokio::test]
    async fn test_fail_on_injects_error() {
        let store = MemoryStore::new().fail_on("media_files");
        assert!(store.media_files(&[1]).await.is_err());
        assert!(store.addresses(&[1]).await.is_ok());
        assert_eq!(store.total_calls().await, 2);
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let store = MemoryStore::new();
        let mut checkpoint = Checkpoint::new("orders", EntityKind::Order);
        checkpoint.record_page(42, 42);

        store.save_checkpoint(&checkpoint, true).await.unwrap();
        assert!(store.load_checkpoint("orders").await.unwrap().is_none());

        store.save_checkpoint(&checkpoint, false).await.unwrap();
        let loaded = store.load_checkpoint("orders").await.unwrap().unwrap();
        assert_eq!(loaded.last_id, 42);
        assert_eq!(store.all_checkpoints().await.unwrap().len(), 1);
    }
}
