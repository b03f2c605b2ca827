//! Relation sets of the exportable primary entities
//!
//! Each set derives its key sets from the page at construction (a cheap
//! in-memory projection) and defers every query to its lazy map.

use super::context::{distinct_ids, ExportEntity, RelationLoader, RelationSet};
use super::multimap::{LazyMultimap, Multimap};
use crate::adapters::database::traits::ExportStore;
use crate::config::ExportFilter;
use crate::core::paging::PageRequest;
use crate::domain::{
    Address, Category, Customer, EntityId, EntityKind, GenericAttribute, Manufacturer, MediaFile,
    Order, OrderItem, ProductCategory, ProductManufacturer, Result, RewardPointsHistory, Shipment,
};
use async_trait::async_trait;

/// Key group of customer generic attributes
pub const CUSTOMER_KEY_GROUP: &str = "Customer";
/// Key group of category generic attributes
pub const CATEGORY_KEY_GROUP: &str = "Category";
/// Key group of manufacturer generic attributes
pub const MANUFACTURER_KEY_GROUP: &str = "Manufacturer";

pub struct CategoryRelations {
    /// Product links by category id
    pub product_categories: LazyMultimap<EntityId, ProductCategory>,
    /// Pictures by media file id
    pub media_files: LazyMultimap<EntityId, MediaFile>,
    /// Generic attributes by category id
    pub generic_attributes: LazyMultimap<EntityId, GenericAttribute>,
}

impl RelationSet for CategoryRelations {
    fn clear(&mut self) {
        self.product_categories.clear();
        self.media_files.clear();
        self.generic_attributes.clear();
    }
}

#[async_trait]
impl ExportEntity for Category {
    const KIND: EntityKind = EntityKind::Category;
    type Relations = CategoryRelations;

    fn id(&self) -> EntityId {
        self.id
    }

    async fn fetch_page(
        store: &dyn ExportStore,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Self>> {
        store.category_page(request, filter).await
    }

    fn relations(page: &[Self], loader: &RelationLoader) -> CategoryRelations {
        let ids: Vec<EntityId> = page.iter().map(|c| c.id).collect();
        let media_file_ids = distinct_ids(page.iter().map(|c| c.media_file_id));

        CategoryRelations {
            generic_attributes: attributes(loader, CATEGORY_KEY_GROUP, ids.clone()),
            product_categories: loader.lazy(ids, |store, keys| async move {
                store
                    .product_categories(&keys)
                    .await
                    .map(|rows| Multimap::group(rows, |pc| pc.category_id))
            }),
            media_files: loader.lazy(media_file_ids, |store, keys| async move {
                store
                    .media_files(&keys)
                    .await
                    .map(|rows| Multimap::group(rows, |m| m.id))
            }),
        }
    }
}

pub struct ManufacturerRelations {
    /// Product links by manufacturer id
    pub product_manufacturers: LazyMultimap<EntityId, ProductManufacturer>,
    /// Logos by media file id
    pub media_files: LazyMultimap<EntityId, MediaFile>,
    /// Generic attributes by manufacturer id
    pub generic_attributes: LazyMultimap<EntityId, GenericAttribute>,
}

impl RelationSet for ManufacturerRelations {
    fn clear(&mut self) {
        self.product_manufacturers.clear();
        self.media_files.clear();
        self.generic_attributes.clear();
    }
}

#[async_trait]
impl ExportEntity for Manufacturer {
    const KIND: EntityKind = EntityKind::Manufacturer;
    type Relations = ManufacturerRelations;

    fn id(&self) -> EntityId {
        self.id
    }

    async fn fetch_page(
        store: &dyn ExportStore,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Self>> {
        store.manufacturer_page(request, filter).await
    }

    fn relations(page: &[Self], loader: &RelationLoader) -> ManufacturerRelations {
        let ids: Vec<EntityId> = page.iter().map(|m| m.id).collect();
        let media_file_ids = distinct_ids(page.iter().map(|m| m.media_file_id));

        ManufacturerRelations {
            generic_attributes: attributes(loader, MANUFACTURER_KEY_GROUP, ids.clone()),
            product_manufacturers: loader.lazy(ids, |store, keys| async move {
                store
                    .product_manufacturers(&keys)
                    .await
                    .map(|rows| Multimap::group(rows, |pm| pm.manufacturer_id))
            }),
            media_files: loader.lazy(media_file_ids, |store, keys| async move {
                store
                    .media_files(&keys)
                    .await
                    .map(|rows| Multimap::group(rows, |m| m.id))
            }),
        }
    }
}

pub struct CustomerRelations {
    /// Generic attributes by customer id
    pub generic_attributes: LazyMultimap<EntityId, GenericAttribute>,
    /// Billing and shipping addresses by address id
    pub addresses: LazyMultimap<EntityId, Address>,
    /// Reward point history by customer id
    pub reward_points_histories: LazyMultimap<EntityId, RewardPointsHistory>,
}

impl RelationSet for CustomerRelations {
    fn clear(&mut self) {
        self.generic_attributes.clear();
        self.addresses.clear();
        self.reward_points_histories.clear();
    }
}

#[async_trait]
impl ExportEntity for Customer {
    const KIND: EntityKind = EntityKind::Customer;
    type Relations = CustomerRelations;

    fn id(&self) -> EntityId {
        self.id
    }

    async fn fetch_page(
        store: &dyn ExportStore,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Self>> {
        store.customer_page(request, filter).await
    }

    fn relations(page: &[Self], loader: &RelationLoader) -> CustomerRelations {
        let ids: Vec<EntityId> = page.iter().map(|c| c.id).collect();
        let address_ids = distinct_ids(
            page.iter()
                .flat_map(|c| [c.billing_address_id, c.shipping_address_id]),
        );

        CustomerRelations {
            generic_attributes: attributes(loader, CUSTOMER_KEY_GROUP, ids.clone()),
            addresses: addresses(loader, address_ids),
            reward_points_histories: reward_points(loader, ids),
        }
    }
}

pub struct OrderRelations {
    /// Ordering customers by customer id
    pub customers: LazyMultimap<EntityId, Customer>,
    /// Customer generic attributes by customer id
    pub generic_attributes: LazyMultimap<EntityId, GenericAttribute>,
    /// Line items by order id
    pub order_items: LazyMultimap<EntityId, OrderItem>,
    /// Shipments by order id
    pub shipments: LazyMultimap<EntityId, Shipment>,
    /// Billing and shipping addresses by address id
    pub addresses: LazyMultimap<EntityId, Address>,
    /// Reward point history by customer id
    pub reward_points_histories: LazyMultimap<EntityId, RewardPointsHistory>,
}

impl RelationSet for OrderRelations {
    fn clear(&mut self) {
        self.customers.clear();
        self.generic_attributes.clear();
        self.order_items.clear();
        self.shipments.clear();
        self.addresses.clear();
        self.reward_points_histories.clear();
    }
}

#[async_trait]
impl ExportEntity for Order {
    const KIND: EntityKind = EntityKind::Order;
    type Relations = OrderRelations;

    fn id(&self) -> EntityId {
        self.id
    }

    async fn fetch_page(
        store: &dyn ExportStore,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Self>> {
        store.order_page(request, filter).await
    }

    fn relations(page: &[Self], loader: &RelationLoader) -> OrderRelations {
        let ids: Vec<EntityId> = page.iter().map(|o| o.id).collect();
        let customer_ids = distinct_ids(page.iter().map(|o| Some(o.customer_id)));
        let address_ids = distinct_ids(
            page.iter()
                .flat_map(|o| [o.billing_address_id, o.shipping_address_id]),
        );

        OrderRelations {
            customers: loader.lazy(customer_ids.clone(), |store, keys| async move {
                store
                    .customers_by_id(&keys)
                    .await
                    .map(|rows| Multimap::group(rows, |c| c.id))
            }),
            generic_attributes: attributes(loader, CUSTOMER_KEY_GROUP, customer_ids.clone()),
            order_items: loader.lazy(ids.clone(), |store, keys| async move {
                store
                    .order_items(&keys)
                    .await
                    .map(|rows| Multimap::group(rows, |item| item.order_id))
            }),
            shipments: loader.lazy(ids, |store, keys| async move {
                store
                    .shipments(&keys)
                    .await
                    .map(|rows| Multimap::group(rows, |s| s.order_id))
            }),
            addresses: addresses(loader, address_ids),
            reward_points_histories: reward_points(loader, customer_ids),
        }
    }
}

fn attributes(
    loader: &RelationLoader,
    key_group: &'static str,
    entity_ids: Vec<EntityId>,
) -> LazyMultimap<EntityId, GenericAttribute> {
    loader.lazy(entity_ids, move |store, keys| async move {
        store
            .generic_attributes(key_group, &keys)
            .await
            .map(|rows| Multimap::group(rows, |a| a.entity_id))
    })
}

fn addresses(loader: &RelationLoader, address_ids: Vec<EntityId>) -> LazyMultimap<EntityId, Address> {
    loader.lazy(address_ids, |store, keys| async move {
        store
            .addresses(&keys)
            .await
            .map(|rows| Multimap::group(rows, |a| a.id))
    })
}

fn reward_points(
    loader: &RelationLoader,
    customer_ids: Vec<EntityId>,
) -> LazyMultimap<EntityId, RewardPointsHistory> {
    loader.lazy(customer_ids, |store, keys| async move {
        store
            .reward_points_histories(&keys)
            .await
            .map(|rows| Multimap::group(rows, |r| r.customer_id))
    })
}
