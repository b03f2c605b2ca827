//! PostgreSQL adapter implementing the data-access traits
//!
//! Primary pages are read in ascending id order, either by `OFFSET` (first
//! page of an offset run) or by `id > $n` cursor. Secondary loads send the
//! whole key set of a page as one `= ANY($1)` array, split into chunks of
//! `database.max_in_list` keys.

use crate::adapters::database::traits::{CheckpointStorage, EmailQueue, ExportStore};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::FromRow;
use crate::config::ExportFilter;
use crate::core::paging::PageRequest;
use crate::core::state::Checkpoint;
use crate::domain::{
    Address, Category, Customer, DataAccessError, EntityId, GenericAttribute, LocalizedProperty,
    Manufacturer, MediaFile, Order, OrderItem, ProductCategory, ProductManufacturer, QueuedEmail,
    ReferenceKind, ReferenceRecord, Result, RewardPointsHistory, Shipment, UrlRecord,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Table layout of one primary entity
#[derive(Debug, Clone, Copy)]
pub struct PrimaryTable {
    pub table: &'static str,
    pub columns: &'static str,
    /// Column the created-from/to window applies to
    pub timestamp_column: &'static str,
    /// Boolean column that hides a row unless `include_hidden` is set
    pub visible_column: Option<&'static str>,
    /// Column the store filter applies to
    pub store_column: Option<&'static str>,
}

const CATEGORY_TABLE: PrimaryTable = PrimaryTable {
    table: "category",
    columns: Category::COLUMNS,
    timestamp_column: "updated_on_utc",
    visible_column: Some("published"),
    store_column: None,
};

const MANUFACTURER_TABLE: PrimaryTable = PrimaryTable {
    table: "manufacturer",
    columns: Manufacturer::COLUMNS,
    timestamp_column: "updated_on_utc",
    visible_column: Some("published"),
    store_column: None,
};

const CUSTOMER_TABLE: PrimaryTable = PrimaryTable {
    table: "customer",
    columns: Customer::COLUMNS,
    timestamp_column: "created_on_utc",
    visible_column: Some("active"),
    store_column: None,
};

const ORDER_TABLE: PrimaryTable = PrimaryTable {
    table: "\"order\"",
    columns: Order::COLUMNS,
    timestamp_column: "created_on_utc",
    visible_column: None,
    store_column: Some("store_id"),
};

fn bind(params: &mut Vec<SqlParam>, value: SqlParam) -> String {
    params.push(value);
    format!("${}", params.len())
}

/// Build the SQL and parameters of one primary page
pub fn page_query(
    table: &PrimaryTable,
    request: &PageRequest,
    filter: &ExportFilter,
) -> (String, Vec<SqlParam>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<SqlParam> = Vec::new();

    if let PageRequest::After { last_id, .. } = request {
        let p = bind(&mut params, Box::new(*last_id));
        conditions.push(format!("id > {p}"));
    }
    if !filter.entity_ids.is_empty() {
        let p = bind(&mut params, Box::new(filter.entity_ids.clone()));
        conditions.push(format!("id = ANY({p})"));
    }
    if let Some(from) = filter.created_from {
        let p = bind(&mut params, Box::new(from));
        conditions.push(format!("{} >= {p}", table.timestamp_column));
    }
    if let Some(to) = filter.created_to {
        let p = bind(&mut params, Box::new(to));
        conditions.push(format!("{} <= {p}", table.timestamp_column));
    }
    if let (Some(column), Some(store_id)) = (table.store_column, filter.store_id) {
        let p = bind(&mut params, Box::new(store_id));
        conditions.push(format!("{column} = {p}"));
    }
    if let Some(column) = table.visible_column {
        if !filter.include_hidden {
            conditions.push(format!("{column} = TRUE"));
        }
    }

    let mut sql = format!("SELECT {} FROM {}", table.columns, table.table);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    let limit = bind(&mut params, Box::new(request.limit() as i64));
    sql.push_str(&format!(" ORDER BY id LIMIT {limit}"));
    if let PageRequest::Offset { offset, .. } = request {
        let p = bind(&mut params, Box::new(*offset as i64));
        sql.push_str(&format!(" OFFSET {p}"));
    }

    (sql, params)
}

fn reference_query(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Store => "SELECT id, name, url AS code FROM store ORDER BY id",
        ReferenceKind::Language => {
            "SELECT id, name, language_culture AS code FROM language ORDER BY id"
        }
        ReferenceKind::Country => {
            "SELECT id, name, two_letter_iso_code AS code FROM country ORDER BY id"
        }
        ReferenceKind::Currency => {
            "SELECT id, name, currency_code AS code FROM currency ORDER BY id"
        }
        ReferenceKind::DeliveryTime => {
            "SELECT id, name, color_hex_value AS code FROM delivery_time ORDER BY id"
        }
        ReferenceKind::QuantityUnit => {
            "SELECT id, name, NULL::text AS code FROM quantity_unit ORDER BY id"
        }
        ReferenceKind::Template => {
            "SELECT id, name, view_path AS code FROM category_template ORDER BY id"
        }
    }
}

/// PostgreSQL implementation of the data-access traits
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }

    async fn page<T: FromRow>(
        &self,
        table: &PrimaryTable,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<T>> {
        let (sql, params) = page_query(table, request, filter);
        let params: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let rows = self.client.query(&sql, &params).await?;
        T::from_rows(&rows)
    }

    /// Run `sql` once per chunk of `keys`; `$1` is the key array and
    /// `extra` binds `$2..`
    async fn by_keys<T: FromRow>(
        &self,
        sql: &str,
        keys: &[EntityId],
        extra: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for chunk in keys.chunks(self.client.max_in_list().max(1)) {
            let chunk = chunk.to_vec();
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(extra.len() + 1);
            params.push(&chunk);
            params.extend_from_slice(extra);

            let rows = self.client.query(sql, &params).await?;
            out.extend(T::from_rows(&rows)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ExportStore for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn category_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Category>> {
        self.page(&CATEGORY_TABLE, request, filter).await
    }

    async fn manufacturer_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Manufacturer>> {
        self.page(&MANUFACTURER_TABLE, request, filter).await
    }

    async fn customer_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Customer>> {
        self.page(&CUSTOMER_TABLE, request, filter).await
    }

    async fn order_page(
        &self,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Order>> {
        self.page(&ORDER_TABLE, request, filter).await
    }

    async fn product_categories(&self, category_ids: &[EntityId]) -> Result<Vec<ProductCategory>> {
        let sql = format!(
            "SELECT {} FROM product_category_mapping WHERE category_id = ANY($1) \
             ORDER BY category_id, display_order, id",
            ProductCategory::COLUMNS
        );
        self.by_keys(&sql, category_ids, &[]).await
    }

    async fn product_manufacturers(
        &self,
        manufacturer_ids: &[EntityId],
    ) -> Result<Vec<ProductManufacturer>> {
        let sql = format!(
            "SELECT {} FROM product_manufacturer_mapping WHERE manufacturer_id = ANY($1) \
             ORDER BY manufacturer_id, display_order, id",
            ProductManufacturer::COLUMNS
        );
        self.by_keys(&sql, manufacturer_ids, &[]).await
    }

    async fn media_files(&self, ids: &[EntityId]) -> Result<Vec<MediaFile>> {
        let sql = format!(
            "SELECT {} FROM media_file WHERE id = ANY($1)",
            MediaFile::COLUMNS
        );
        self.by_keys(&sql, ids, &[]).await
    }

    async fn generic_attributes(
        &self,
        key_group: &str,
        entity_ids: &[EntityId],
    ) -> Result<Vec<GenericAttribute>> {
        let sql = format!(
            "SELECT {} FROM generic_attribute WHERE entity_id = ANY($1) AND key_group = $2 \
             ORDER BY entity_id, id",
            GenericAttribute::COLUMNS
        );
        self.by_keys(&sql, entity_ids, &[&key_group]).await
    }

    async fn addresses(&self, ids: &[EntityId]) -> Result<Vec<Address>> {
        let sql = format!("SELECT {} FROM address WHERE id = ANY($1)", Address::COLUMNS);
        self.by_keys(&sql, ids, &[]).await
    }

    async fn customers_by_id(&self, ids: &[EntityId]) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT {} FROM customer WHERE id = ANY($1)",
            Customer::COLUMNS
        );
        self.by_keys(&sql, ids, &[]).await
    }

    async fn order_items(&self, order_ids: &[EntityId]) -> Result<Vec<OrderItem>> {
        let sql = format!(
            "SELECT {} FROM order_item WHERE order_id = ANY($1) ORDER BY order_id, id",
            OrderItem::COLUMNS
        );
        self.by_keys(&sql, order_ids, &[]).await
    }

    async fn shipments(&self, order_ids: &[EntityId]) -> Result<Vec<Shipment>> {
        let sql = format!(
            "SELECT {} FROM shipment WHERE order_id = ANY($1) ORDER BY order_id, id",
            Shipment::COLUMNS
        );
        self.by_keys(&sql, order_ids, &[]).await
    }

    async fn reward_points_histories(
        &self,
        customer_ids: &[EntityId],
    ) -> Result<Vec<RewardPointsHistory>> {
        let sql = format!(
            "SELECT {} FROM reward_points_history WHERE customer_id = ANY($1) \
             ORDER BY customer_id, id",
            RewardPointsHistory::COLUMNS
        );
        self.by_keys(&sql, customer_ids, &[]).await
    }

    async fn localized_properties(
        &self,
        key_group: &str,
        language_id: EntityId,
        entity_ids: Option<&[EntityId]>,
    ) -> Result<Vec<LocalizedProperty>> {
        match entity_ids {
            Some(ids) => {
                let sql = format!(
                    "SELECT {} FROM localized_property \
                     WHERE entity_id = ANY($1) AND locale_key_group = $2 AND language_id = $3",
                    LocalizedProperty::COLUMNS
                );
                self.by_keys(&sql, ids, &[&key_group, &language_id]).await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM localized_property \
                     WHERE locale_key_group = $1 AND language_id = $2",
                    LocalizedProperty::COLUMNS
                );
                let rows = self.client.query(&sql, &[&key_group, &language_id]).await?;
                LocalizedProperty::from_rows(&rows)
            }
        }
    }

    async fn url_records(
        &self,
        entity_name: &str,
        language_id: EntityId,
        entity_ids: Option<&[EntityId]>,
    ) -> Result<Vec<UrlRecord>> {
        match entity_ids {
            Some(ids) => {
                let sql = format!(
                    "SELECT {} FROM url_record WHERE entity_id = ANY($1) AND entity_name = $2 \
                     AND language_id = $3 AND is_active = TRUE",
                    UrlRecord::COLUMNS
                );
                self.by_keys(&sql, ids, &[&entity_name, &language_id]).await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM url_record WHERE entity_name = $1 AND language_id = $2 \
                     AND is_active = TRUE",
                    UrlRecord::COLUMNS
                );
                let rows = self
                    .client
                    .query(&sql, &[&entity_name, &language_id])
                    .await?;
                UrlRecord::from_rows(&rows)
            }
        }
    }

    async fn reference_data(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRecord>> {
        let rows = self.client.query(reference_query(kind), &[]).await?;
        ReferenceRecord::from_rows(&rows)
    }
}

#[async_trait]
impl EmailQueue for PostgreSQLAdapter {
    async fn enqueue(&self, email: &QueuedEmail) -> Result<EntityId> {
        let failed = |e: tokio_postgres::Error| DataAccessError::QueryFailed(e.to_string());

        let mut client = self.client.get_connection().await?;
        let tx = client.transaction().await.map_err(failed)?;

        let row = tx
            .query_one(
                "INSERT INTO queued_email (email_account_id, recipient, subject, body, created_on_utc) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &email.email_account_id,
                    &email.to,
                    &email.subject,
                    &email.body,
                    &email.created_on_utc,
                ],
            )
            .await
            .map_err(failed)?;
        let id: EntityId = row.try_get("id").map_err(failed)?;

        for attachment in &email.attachments {
            tx.execute(
                "INSERT INTO queued_email_attachment (queued_email_id, name, mime_type, data) \
                 VALUES ($1, $2, $3, $4)",
                &[&id, &attachment.name, &attachment.mime_type, &attachment.data],
            )
            .await
            .map_err(failed)?;
        }

        tx.commit().await.map_err(failed)?;
        tracing::debug!(email_id = id, to = %email.to, "Queued e-mail");
        Ok(id)
    }
}

#[async_trait]
impl CheckpointStorage for PostgreSQLAdapter {
    async fn load_checkpoint(&self, profile_name: &str) -> Result<Option<Checkpoint>> {
        let sql = format!(
            "SELECT {} FROM export_checkpoints WHERE profile_name = $1",
            Checkpoint::COLUMNS
        );
        let rows = self.client.query(&sql, &[&profile_name]).await?;
        rows.first().map(Checkpoint::from_row).transpose()
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint, dry_run: bool) -> Result<()> {
        if dry_run {
            tracing::info!(
                profile = %checkpoint.profile_name,
                last_id = checkpoint.last_id,
                status = %checkpoint.status,
                "DRY RUN: Would save checkpoint"
            );
            return Ok(());
        }

        let entity = checkpoint.entity.to_string().to_lowercase();
        let status = checkpoint.status.as_str();
        let records_exported = i64::try_from(checkpoint.records_exported).unwrap_or(i64::MAX);

        self.client
            .execute(
                "INSERT INTO export_checkpoints \
                 (profile_name, entity, last_id, records_exported, started_at, completed_at, status, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) \
                 ON CONFLICT (profile_name) DO UPDATE SET \
                 entity = EXCLUDED.entity, \
                 last_id = EXCLUDED.last_id, \
                 records_exported = EXCLUDED.records_exported, \
                 started_at = EXCLUDED.started_at, \
                 completed_at = EXCLUDED.completed_at, \
                 status = EXCLUDED.status, \
                 updated_at = NOW()",
                &[
                    &checkpoint.profile_name,
                    &entity,
                    &checkpoint.last_id,
                    &records_exported,
                    &checkpoint.started_at,
                    &checkpoint.completed_at,
                    &status,
                ],
            )
            .await?;

        tracing::debug!(
            profile = %checkpoint.profile_name,
            last_id = checkpoint.last_id,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn all_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let sql = format!(
            "SELECT {} FROM export_checkpoints ORDER BY profile_name",
            Checkpoint::COLUMNS
        );
        let rows = self.client.query(&sql, &[]).await?;
        Checkpoint::from_rows(&rows)
    }
}
