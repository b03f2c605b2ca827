//! Data-access traits
//!
//! Every query an export run issues goes through one of these traits, so the
//! run logic can be exercised against the in-memory adapter and deployed
//! against PostgreSQL.

use crate::config::ExportFilter;
use crate::core::paging::PageRequest;
use crate::core::state::Checkpoint;
use crate::domain::{
    Address, Category, Customer, EntityId, GenericAttribute, LocalizedProperty, Manufacturer,
    MediaFile, Order, OrderItem, ProductCategory, ProductManufacturer, QueuedEmail,
    ReferenceKind, ReferenceRecord, Result, RewardPointsHistory, Shipment, UrlRecord,
};
use async_trait::async_trait;

/// Read access to the shop data an export needs
///
/// Page methods return rows ordered by ascending id. Secondary methods take
/// the full key set of a page and must answer it with a single round trip
/// (or one per `max_in_list` chunk); they never return rows for keys outside
/// the set.
#[async_trait]
pub trait ExportStore: Send + Sync {
    /// Test the database connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    async fn category_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Category>>;

    async fn manufacturer_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Manufacturer>>;

    async fn customer_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Customer>>;

    async fn order_page(&self, request: &PageRequest, filter: &ExportFilter)
        -> Result<Vec<Order>>;

    /// Product assignments of the given categories
    async fn product_categories(&self, category_ids: &[EntityId]) -> Result<Vec<ProductCategory>>;

    /// Product assignments of the given manufacturers
    async fn product_manufacturers(
        &self,
        manufacturer_ids: &[EntityId],
    ) -> Result<Vec<ProductManufacturer>>;

    async fn media_files(&self, ids: &[EntityId]) -> Result<Vec<MediaFile>>;

    /// Attributes of entities of one key group (e.g. `Customer`)
    async fn generic_attributes(
        &self,
        key_group: &str,
        entity_ids: &[EntityId],
    ) -> Result<Vec<GenericAttribute>>;

    async fn addresses(&self, ids: &[EntityId]) -> Result<Vec<Address>>;

    async fn customers_by_id(&self, ids: &[EntityId]) -> Result<Vec<Customer>>;

    async fn order_items(&self, order_ids: &[EntityId]) -> Result<Vec<OrderItem>>;

    async fn shipments(&self, order_ids: &[EntityId]) -> Result<Vec<Shipment>>;

    async fn reward_points_histories(
        &self,
        customer_ids: &[EntityId],
    ) -> Result<Vec<RewardPointsHistory>>;

    /// Translations of one key group in one language
    ///
    /// `entity_ids = None` loads the whole group.
    async fn localized_properties(
        &self,
        key_group: &str,
        language_id: EntityId,
        entity_ids: Option<&[EntityId]>,
    ) -> Result<Vec<LocalizedProperty>>;

    /// Active URL slugs of one entity name in one language
    ///
    /// `entity_ids = None` loads every slug of the entity name.
    async fn url_records(
        &self,
        entity_name: &str,
        language_id: EntityId,
        entity_ids: Option<&[EntityId]>,
    ) -> Result<Vec<UrlRecord>>;

    /// Small reference tables loaded once per run
    async fn reference_data(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRecord>>;
}

/// Outbound e-mail queue
#[async_trait]
pub trait EmailQueue: Send + Sync {
    /// Persist one message; the write is committed before this returns
    ///
    /// # Returns
    ///
    /// Returns the id of the queued message.
    async fn enqueue(&self, email: &QueuedEmail) -> Result<EntityId>;
}

/// Checkpoint persistence
#[async_trait]
pub trait CheckpointStorage: Send + Sync {
    /// Load the checkpoint of a profile
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the profile never ran.
    async fn load_checkpoint(&self, profile_name: &str) -> Result<Option<Checkpoint>>;

    /// Upsert a checkpoint
    ///
    /// # Arguments
    ///
    /// * `checkpoint` - Checkpoint to save
    /// * `dry_run` - If true, skip actual database writes
    async fn save_checkpoint(&self, checkpoint: &Checkpoint, dry_run: bool) -> Result<()>;

    async fn all_checkpoints(&self) -> Result<Vec<Checkpoint>>;
}
